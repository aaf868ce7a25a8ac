//! Media library.
//!
//! Scans a directory of MP3 files and derives the playlists the HTTP API
//! serves and the controller queues onto speakers. Layout on disk:
//!
//! ```text
//! <media root>/
//!   presets/
//!     1/
//!       01-first.mp3
//!       02-second.mp3
//!     2/
//!       ...
//!   anything-else.mp3   (picked up by the whole-library playlist)
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::context::UrlBuilder;

/// Subdirectory that holds the preset playlists.
const PRESETS_DIR: &str = "presets";

/// Errors raised by library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Filesystem access failed.
    #[error("media library I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested preset directory does not exist.
    #[error("preset {0} not found")]
    PresetNotFound(String),

    /// The preset identifier is not a plain directory name.
    #[error("invalid preset identifier: {0}")]
    InvalidPreset(String),
}

/// Convenient Result alias for library operations.
pub type LibraryResult<T> = Result<T, LibraryError>;

/// One playable entry of a playlist.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlaylistItem {
    /// Position within the playlist (0-based).
    pub index: usize,
    /// Track title (filename without extension).
    pub title: String,
    /// Filename as it appears on disk.
    pub filename: String,
    /// Absolute URL external devices fetch the track from.
    pub url: String,
}

/// A directory of MP3 files served over `/music/`.
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    /// Creates a library rooted at the given directory.
    ///
    /// The directory does not need to exist yet; scans of a missing root
    /// yield empty results rather than errors, so a server can start before
    /// its media volume is mounted.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the library root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists every MP3 in the library, as paths relative to the root with
    /// `/` separators, sorted lexicographically.
    pub fn list_tracks(&self) -> LibraryResult<Vec<String>> {
        let mut tracks = Vec::new();
        if self.root.is_dir() {
            collect_mp3s(&self.root, &self.root, &mut tracks)?;
        }
        tracks.sort();
        Ok(tracks)
    }

    /// Lists the MP3 filenames directly inside `presets/<preset>/`, sorted.
    ///
    /// # Errors
    /// `InvalidPreset` for identifiers that are not plain directory names,
    /// `PresetNotFound` when the directory does not exist.
    pub fn preset_tracks(&self, preset: &str) -> LibraryResult<Vec<String>> {
        validate_preset_id(preset)?;

        let dir = self.root.join(PRESETS_DIR).join(preset);
        if !dir.is_dir() {
            return Err(LibraryError::PresetNotFound(preset.to_string()));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_mp3(&name) {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Builds the playlist for a preset, with URLs from the given builder.
    pub fn preset_playlist(
        &self,
        preset: &str,
        urls: &UrlBuilder,
    ) -> LibraryResult<Vec<PlaylistItem>> {
        let items = self
            .preset_tracks(preset)?
            .into_iter()
            .enumerate()
            .map(|(index, filename)| {
                let relative = format!("{}/{}/{}", PRESETS_DIR, preset, filename);
                PlaylistItem {
                    index,
                    title: title_of(&filename),
                    url: urls.media_url(&relative),
                    filename,
                }
            })
            .collect();
        Ok(items)
    }

    /// Builds the playlist spanning the whole library.
    pub fn full_playlist(&self, urls: &UrlBuilder) -> LibraryResult<Vec<PlaylistItem>> {
        let items = self
            .list_tracks()?
            .into_iter()
            .enumerate()
            .map(|(index, relative)| {
                let filename = relative
                    .rsplit('/')
                    .next()
                    .unwrap_or(relative.as_str())
                    .to_string();
                PlaylistItem {
                    index,
                    title: title_of(&filename),
                    url: urls.media_url(&relative),
                    filename,
                }
            })
            .collect();
        Ok(items)
    }
}

/// Renders a playlist in Extended M3U format.
#[must_use]
pub fn render_m3u(items: &[PlaylistItem]) -> String {
    let mut m3u = String::from("#EXTM3U\n");
    for item in items {
        m3u.push_str(&format!("#EXTINF:-1,{}\n{}\n", item.filename, item.url));
    }
    m3u
}

/// Recursively collects MP3 paths relative to `root`.
fn collect_mp3s(root: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_mp3s(root, &path, out)?;
        } else if is_mp3(&entry.file_name().to_string_lossy()) {
            if let Ok(relative) = path.strip_prefix(root) {
                // Normalize to forward slashes so URLs are platform-independent.
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
    Ok(())
}

fn is_mp3(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
}

/// Derives a display title from a filename by dropping the extension.
fn title_of(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// Rejects preset identifiers that could escape the presets directory.
fn validate_preset_id(preset: &str) -> LibraryResult<()> {
    if preset.is_empty()
        || preset == "."
        || preset == ".."
        || preset.contains('/')
        || preset.contains('\\')
    {
        return Err(LibraryError::InvalidPreset(preset.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, MediaLibrary) {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();

        std::fs::create_dir_all(root.join("presets/5")).unwrap();
        std::fs::create_dir_all(root.join("presets/empty")).unwrap();
        std::fs::write(root.join("presets/5/02-second.mp3"), b"x").unwrap();
        std::fs::write(root.join("presets/5/01-first.mp3"), b"x").unwrap();
        std::fs::write(root.join("presets/5/cover.jpg"), b"x").unwrap();
        std::fs::write(root.join("loose.MP3"), b"x").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();

        let library = MediaLibrary::new(root);
        (dir, library)
    }

    fn urls() -> UrlBuilder {
        UrlBuilder::new("192.168.1.5", 8080)
    }

    #[test]
    fn list_tracks_recurses_and_sorts() {
        let (_dir, library) = fixture();
        let tracks = library.list_tracks().unwrap();
        assert_eq!(
            tracks,
            vec![
                "loose.MP3".to_string(),
                "presets/5/01-first.mp3".to_string(),
                "presets/5/02-second.mp3".to_string(),
            ]
        );
    }

    #[test]
    fn missing_root_yields_empty_library() {
        let library = MediaLibrary::new("/nonexistent/roomcast-test");
        assert!(library.list_tracks().unwrap().is_empty());
    }

    #[test]
    fn preset_tracks_sorted_and_filtered() {
        let (_dir, library) = fixture();
        let tracks = library.preset_tracks("5").unwrap();
        assert_eq!(tracks, vec!["01-first.mp3", "02-second.mp3"]);
    }

    #[test]
    fn unknown_preset_is_not_found() {
        let (_dir, library) = fixture();
        assert!(matches!(
            library.preset_tracks("99"),
            Err(LibraryError::PresetNotFound(_))
        ));
    }

    #[test]
    fn traversal_identifiers_are_rejected() {
        let (_dir, library) = fixture();
        for bad in ["..", "", "a/b", "a\\b", "."] {
            assert!(
                matches!(library.preset_tracks(bad), Err(LibraryError::InvalidPreset(_))),
                "expected InvalidPreset for {:?}",
                bad
            );
        }
    }

    #[test]
    fn empty_preset_is_valid_and_empty() {
        let (_dir, library) = fixture();
        assert!(library.preset_tracks("empty").unwrap().is_empty());
    }

    #[test]
    fn preset_playlist_builds_items() {
        let (_dir, library) = fixture();
        let items = library.preset_playlist("5", &urls()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].index, 0);
        assert_eq!(items[0].title, "01-first");
        assert_eq!(items[0].filename, "01-first.mp3");
        assert_eq!(
            items[0].url,
            "http://192.168.1.5:8080/music/presets/5/01-first.mp3"
        );
        assert_eq!(items[1].index, 1);
    }

    #[test]
    fn full_playlist_spans_library() {
        let (_dir, library) = fixture();
        let items = library.full_playlist(&urls()).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].filename, "loose.MP3");
        assert_eq!(items[0].url, "http://192.168.1.5:8080/music/loose.MP3");
    }

    #[test]
    fn m3u_rendering() {
        let items = vec![PlaylistItem {
            index: 0,
            title: "song".to_string(),
            filename: "song.mp3".to_string(),
            url: "http://192.168.1.5:8080/music/song.mp3".to_string(),
        }];
        let m3u = render_m3u(&items);
        assert_eq!(
            m3u,
            "#EXTM3U\n#EXTINF:-1,song.mp3\nhttp://192.168.1.5:8080/music/song.mp3\n"
        );
    }
}
