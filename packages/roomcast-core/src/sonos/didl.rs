//! DIDL-Lite metadata formatting and parsing.
//!
//! DIDL-Lite is the XML vocabulary UPnP uses for content metadata. We emit it
//! when enqueueing tracks (so the Sonos app shows a title instead of a bare
//! URL) and parse it when browsing a speaker's play queue.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Serialize;

use super::utils::escape_xml;

/// UPnP class for a plain audio track.
const MUSIC_TRACK_CLASS: &str = "object.item.audioItem.musicTrack";

/// Formats the DIDL-Lite metadata sent along with an enqueued track URI.
///
/// Only the title is dynamic; the class marks the entry as a music track so
/// the controller apps render it with track styling.
#[must_use]
pub fn format_track_didl(title: &str) -> String {
    format!(
        concat!(
            r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
            r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" "#,
            r#"xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#,
            r#"<item id="-1" parentID="-1" restricted="true">"#,
            "<dc:title>{}</dc:title>",
            "<upnp:class>{}</upnp:class>",
            "</item></DIDL-Lite>"
        ),
        escape_xml(title),
        MUSIC_TRACK_CLASS
    )
}

/// One entry of a speaker's play queue, as reported by Content Directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueItem {
    /// Position in the queue (0-based).
    pub index: usize,
    /// Object ID (e.g. `Q:0/3`).
    pub id: String,
    /// Parent container ID (normally `Q:0`).
    pub parent_id: String,
    /// Track title.
    pub title: String,
    /// Artist, when the metadata carries one.
    pub creator: String,
    /// Album, when the metadata carries one.
    pub album: String,
    /// UPnP class (e.g. `object.item.audioItem.musicTrack`).
    pub class: String,
    /// Resource URI the speaker fetches.
    pub uri: String,
    /// Original track number from the source metadata.
    #[serde(rename = "track_number")]
    pub original_track_number: Option<u32>,
    /// Album art URI, when present.
    pub album_art_uri: String,
    /// Whether the entry is marked restricted.
    pub restricted: bool,
}

fn attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Parses the `<item>` entries out of a DIDL-Lite document.
///
/// Expects the raw (already unescaped) DIDL XML, as extracted from a Content
/// Directory `Browse` response. Unknown elements are skipped; a malformed
/// tail truncates the result rather than failing the whole parse.
#[must_use]
pub fn parse_didl_items(xml: &str) -> Vec<QueueItem> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut items = Vec::new();
    let mut current: Option<QueueItem> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"item" => {
                    let mut item = QueueItem {
                        index: items.len(),
                        id: attr(e, b"id").unwrap_or_default(),
                        parent_id: attr(e, b"parentID").unwrap_or_default(),
                        ..QueueItem::default()
                    };
                    item.restricted =
                        matches!(attr(e, b"restricted").as_deref(), Some("true") | Some("1"));
                    current = Some(item);
                }
                child => {
                    let Some(item) = current.as_mut() else {
                        continue;
                    };
                    let text = match reader.read_text(e.name()) {
                        Ok(t) => t.into_owned(),
                        Err(_) => continue,
                    };
                    match child {
                        b"dc:title" => item.title = text,
                        b"dc:creator" => item.creator = text,
                        b"upnp:album" => item.album = text,
                        b"upnp:class" => item.class = text,
                        b"upnp:albumArtURI" => item.album_art_uri = text,
                        b"upnp:originalTrackNumber" => {
                            item.original_track_number = text.trim().parse().ok();
                        }
                        b"res" => item.uri = text,
                        _ => {}
                    }
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"item" => {
                if let Some(item) = current.take() {
                    items.push(item);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::trace!("[DIDL] parse error, truncating at item {}: {:?}", items.len(), e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = concat!(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
        r#"xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" "#,
        r#"xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">"#,
        r#"<item id="Q:0/1" parentID="Q:0" restricted="true">"#,
        r#"<res protocolInfo="http-get:*:audio/mpeg:*">http://192.168.1.5:8080/music/a.mp3</res>"#,
        "<dc:title>First Track</dc:title>",
        "<dc:creator>Some Band</dc:creator>",
        "<upnp:album>Some Album</upnp:album>",
        "<upnp:class>object.item.audioItem.musicTrack</upnp:class>",
        "<upnp:originalTrackNumber>4</upnp:originalTrackNumber>",
        "</item>",
        r#"<item id="Q:0/2" parentID="Q:0" restricted="false">"#,
        "<dc:title>Second &amp; Last</dc:title>",
        "</item>",
        "</DIDL-Lite>"
    );

    #[test]
    fn parses_queue_items_in_order() {
        let items = parse_didl_items(SAMPLE);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].index, 0);
        assert_eq!(items[0].id, "Q:0/1");
        assert_eq!(items[0].parent_id, "Q:0");
        assert_eq!(items[0].title, "First Track");
        assert_eq!(items[0].creator, "Some Band");
        assert_eq!(items[0].album, "Some Album");
        assert_eq!(items[0].class, "object.item.audioItem.musicTrack");
        assert_eq!(items[0].uri, "http://192.168.1.5:8080/music/a.mp3");
        assert_eq!(items[0].original_track_number, Some(4));
        assert!(items[0].restricted);

        assert_eq!(items[1].index, 1);
        assert_eq!(items[1].title, "Second & Last");
        assert!(!items[1].restricted);
        assert!(items[1].uri.is_empty());
    }

    #[test]
    fn empty_didl_yields_no_items() {
        let xml = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"></DIDL-Lite>"#;
        assert!(parse_didl_items(xml).is_empty());
    }

    #[test]
    fn format_track_didl_escapes_title() {
        let didl = format_track_didl("Tom & Jerry");
        assert!(didl.contains("<dc:title>Tom &amp; Jerry</dc:title>"));
        assert!(didl.contains(MUSIC_TRACK_CLASS));
        assert!(didl.starts_with("<DIDL-Lite"));
        assert!(didl.ends_with("</DIDL-Lite>"));
    }

    #[test]
    fn roundtrip_of_formatted_metadata() {
        let didl = format_track_didl("03 - Señor Blues");
        let items = parse_didl_items(&didl);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "03 - Señor Blues");
        assert_eq!(items[0].class, MUSIC_TRACK_CLASS);
    }
}
