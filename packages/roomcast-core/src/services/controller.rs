//! Speaker command orchestration.
//!
//! Translates each API command into the SOAP call sequence it needs:
//! resolve the speaker from the registry, issue one to a handful of
//! sequential actions, and report the outcome. Handlers stay thin by
//! delegating here.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use crate::context::NetworkContext;
use crate::error::{RoomcastError, RoomcastResult};
use crate::library::{MediaLibrary, PlaylistItem};
use crate::sonos::discovery::Speaker;
use crate::sonos::{didl::QueueItem, queue, transport, volume};
use crate::state::SpeakerRegistry;

/// Outcome of a playback command, reported back to the API client.
#[derive(Debug, Serialize)]
pub struct PlaybackOutcome {
    /// Name of the speaker the command ran against.
    pub speaker: String,
    /// Number of tracks queued (for queue-building commands).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued: Option<usize>,
    /// Whether the speaker ended up playing (for the toggle command).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playing: Option<bool>,
}

/// Outcome of a volume command.
#[derive(Debug, Serialize)]
pub struct VolumeOutcome {
    pub speaker: String,
    pub volume: u8,
}

/// Outcome of a mute toggle.
#[derive(Debug, Serialize)]
pub struct MuteOutcome {
    pub speaker: String,
    pub muted: bool,
}

/// Snapshot of a speaker's play queue.
#[derive(Debug, Serialize)]
pub struct QueueSnapshot {
    pub speaker: String,
    pub queue_length: usize,
    pub queue_items: Vec<QueueItem>,
}

/// Orchestrates UPnP commands against registered speakers.
pub struct SpeakerController {
    http: Client,
    registry: Arc<SpeakerRegistry>,
    library: Arc<MediaLibrary>,
    network: NetworkContext,
    default_speaker: Option<String>,
    volume_step: u8,
}

impl SpeakerController {
    /// Creates a controller.
    pub fn new(
        http: Client,
        registry: Arc<SpeakerRegistry>,
        library: Arc<MediaLibrary>,
        network: NetworkContext,
        default_speaker: Option<String>,
        volume_step: u8,
    ) -> Self {
        Self {
            http,
            registry,
            library,
            network,
            default_speaker,
            volume_step,
        }
    }

    /// Resolves the speaker a command addresses.
    ///
    /// An explicit name wins; otherwise the configured default is used.
    pub fn resolve(&self, name: Option<&str>) -> RoomcastResult<Speaker> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(n) => n,
            None => self.default_speaker.as_deref().ok_or_else(|| {
                RoomcastError::InvalidRequest(
                    "no speaker named and no default speaker configured".into(),
                )
            })?,
        };

        self.registry
            .find(name)
            .ok_or_else(|| RoomcastError::SpeakerNotFound(name.to_string()))
    }

    /// Queues a preset playlist on a speaker and starts playback.
    pub async fn play_preset(
        &self,
        speaker_name: Option<&str>,
        preset: &str,
    ) -> RoomcastResult<PlaybackOutcome> {
        let speaker = self.resolve(speaker_name)?;
        let items = self
            .library
            .preset_playlist(preset, &self.network.url_builder())?;

        log::info!(
            "[Controller] preset {} ({} tracks) -> {}",
            preset,
            items.len(),
            speaker.name
        );

        let queued = self.rebuild_queue_and_play(&speaker, &items).await?;
        Ok(PlaybackOutcome {
            speaker: speaker.name,
            queued: Some(queued),
            playing: None,
        })
    }

    /// Queues the entire library on a speaker and starts playback.
    pub async fn play_library(
        &self,
        speaker_name: Option<&str>,
    ) -> RoomcastResult<PlaybackOutcome> {
        let speaker = self.resolve(speaker_name)?;
        let items = self.library.full_playlist(&self.network.url_builder())?;

        log::info!(
            "[Controller] full library ({} tracks) -> {}",
            items.len(),
            speaker.name
        );

        let queued = self.rebuild_queue_and_play(&speaker, &items).await?;
        Ok(PlaybackOutcome {
            speaker: speaker.name,
            queued: Some(queued),
            playing: None,
        })
    }

    /// Clears the queue, enqueues the playlist, points the transport at the
    /// queue, and plays. The clear is best-effort: a stale queue is better
    /// than refusing to play.
    async fn rebuild_queue_and_play(
        &self,
        speaker: &Speaker,
        items: &[PlaylistItem],
    ) -> RoomcastResult<usize> {
        if items.is_empty() {
            return Err(RoomcastError::NoTracks);
        }

        if let Err(e) = queue::clear_queue(&self.http, &speaker.address).await {
            log::warn!(
                "[Controller] failed to clear queue on {}: {}",
                speaker.name,
                e
            );
        }

        for item in items {
            let position =
                queue::add_uri_to_queue(&self.http, &speaker.address, &item.url, &item.title)
                    .await?;
            log::debug!("[Controller] queued {} at position {}", item.url, position);
        }

        transport::set_queue_source(&self.http, &speaker.address, &speaker.uuid).await?;
        transport::play(&self.http, &speaker.address).await?;

        log::info!(
            "[Controller] playback started on {} ({} tracks)",
            speaker.name,
            items.len()
        );
        Ok(items.len())
    }

    /// Pauses playback.
    pub async fn pause(&self, speaker_name: Option<&str>) -> RoomcastResult<PlaybackOutcome> {
        let speaker = self.resolve(speaker_name)?;
        transport::pause(&self.http, &speaker.address).await?;
        Ok(PlaybackOutcome {
            speaker: speaker.name,
            queued: None,
            playing: Some(false),
        })
    }

    /// Toggles between playing and paused based on the transport state.
    pub async fn toggle_play_pause(
        &self,
        speaker_name: Option<&str>,
    ) -> RoomcastResult<PlaybackOutcome> {
        let speaker = self.resolve(speaker_name)?;
        let info = transport::get_transport_info(&self.http, &speaker.address).await?;

        let playing = if info.state.is_playing() {
            transport::pause(&self.http, &speaker.address).await?;
            false
        } else {
            transport::play(&self.http, &speaker.address).await?;
            true
        };

        log::info!(
            "[Controller] {} was {}, now {}",
            speaker.name,
            info.state,
            if playing { "playing" } else { "paused" }
        );
        Ok(PlaybackOutcome {
            speaker: speaker.name,
            queued: None,
            playing: Some(playing),
        })
    }

    /// Restarts the queue from the first track.
    pub async fn restart_queue(
        &self,
        speaker_name: Option<&str>,
    ) -> RoomcastResult<PlaybackOutcome> {
        let speaker = self.resolve(speaker_name)?;
        transport::seek_to_track(&self.http, &speaker.address, 1).await?;
        transport::play(&self.http, &speaker.address).await?;
        Ok(PlaybackOutcome {
            speaker: speaker.name,
            queued: None,
            playing: Some(true),
        })
    }

    /// Skips to the next track.
    pub async fn next_track(&self, speaker_name: Option<&str>) -> RoomcastResult<PlaybackOutcome> {
        let speaker = self.resolve(speaker_name)?;
        transport::next_track(&self.http, &speaker.address).await?;
        Ok(PlaybackOutcome {
            speaker: speaker.name,
            queued: None,
            playing: None,
        })
    }

    /// Skips to the previous track.
    pub async fn previous_track(
        &self,
        speaker_name: Option<&str>,
    ) -> RoomcastResult<PlaybackOutcome> {
        let speaker = self.resolve(speaker_name)?;
        transport::previous_track(&self.http, &speaker.address).await?;
        Ok(PlaybackOutcome {
            speaker: speaker.name,
            queued: None,
            playing: None,
        })
    }

    /// Raises the volume by one step.
    pub async fn volume_up(&self, speaker_name: Option<&str>) -> RoomcastResult<VolumeOutcome> {
        self.step_volume(speaker_name, true).await
    }

    /// Lowers the volume by one step.
    pub async fn volume_down(&self, speaker_name: Option<&str>) -> RoomcastResult<VolumeOutcome> {
        self.step_volume(speaker_name, false).await
    }

    async fn step_volume(
        &self,
        speaker_name: Option<&str>,
        up: bool,
    ) -> RoomcastResult<VolumeOutcome> {
        let speaker = self.resolve(speaker_name)?;
        let current = volume::get_volume(&self.http, &speaker.address).await?;
        let target = stepped_volume(current, self.volume_step, up);

        if target != current {
            volume::set_volume(&self.http, &speaker.address, target).await?;
        }

        log::info!(
            "[Controller] volume on {}: {} -> {}",
            speaker.name,
            current,
            target
        );
        Ok(VolumeOutcome {
            speaker: speaker.name,
            volume: target,
        })
    }

    /// Toggles the mute state.
    pub async fn toggle_mute(&self, speaker_name: Option<&str>) -> RoomcastResult<MuteOutcome> {
        let speaker = self.resolve(speaker_name)?;
        let muted = !volume::get_mute(&self.http, &speaker.address).await?;
        volume::set_mute(&self.http, &speaker.address, muted).await?;

        log::info!(
            "[Controller] {} {}",
            speaker.name,
            if muted { "muted" } else { "unmuted" }
        );
        Ok(MuteOutcome {
            speaker: speaker.name,
            muted,
        })
    }

    /// Reads the speaker's play queue.
    pub async fn queue_snapshot(
        &self,
        speaker_name: Option<&str>,
    ) -> RoomcastResult<QueueSnapshot> {
        let speaker = self.resolve(speaker_name)?;
        let items = queue::browse_queue(&self.http, &speaker.address).await?;
        Ok(QueueSnapshot {
            speaker: speaker.name,
            queue_length: items.len(),
            queue_items: items,
        })
    }
}

/// Applies one volume step with clamping at both ends.
fn stepped_volume(current: u8, step: u8, up: bool) -> u8 {
    if up {
        current.saturating_add(step).min(100)
    } else {
        current.saturating_sub(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_controller(default_speaker: Option<&str>) -> SpeakerController {
        let registry = Arc::new(SpeakerRegistry::new());
        registry.upsert(vec![Speaker {
            name: "Kitchen".to_string(),
            address: "192.168.1.10".to_string(),
            room: "Kitchen".to_string(),
            uuid: "RINCON_A".to_string(),
            model_name: None,
        }]);

        SpeakerController::new(
            Client::new(),
            registry,
            Arc::new(MediaLibrary::new("/nonexistent")),
            NetworkContext::explicit(8080, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5))),
            default_speaker.map(str::to_string),
            5,
        )
    }

    #[test]
    fn stepped_volume_clamps_at_both_ends() {
        assert_eq!(stepped_volume(50, 5, true), 55);
        assert_eq!(stepped_volume(98, 5, true), 100);
        assert_eq!(stepped_volume(100, 5, true), 100);
        assert_eq!(stepped_volume(50, 5, false), 45);
        assert_eq!(stepped_volume(3, 5, false), 0);
        assert_eq!(stepped_volume(0, 5, false), 0);
    }

    #[test]
    fn resolve_prefers_explicit_name() {
        let controller = test_controller(Some("Den"));
        let speaker = controller.resolve(Some("Kitchen")).unwrap();
        assert_eq!(speaker.uuid, "RINCON_A");
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let controller = test_controller(Some("Kitchen"));
        let speaker = controller.resolve(None).unwrap();
        assert_eq!(speaker.name, "Kitchen");
    }

    #[test]
    fn resolve_without_default_is_invalid_request() {
        let controller = test_controller(None);
        assert!(matches!(
            controller.resolve(None),
            Err(RoomcastError::InvalidRequest(_))
        ));
    }

    #[test]
    fn resolve_empty_name_uses_default() {
        let controller = test_controller(Some("Kitchen"));
        let speaker = controller.resolve(Some("")).unwrap();
        assert_eq!(speaker.name, "Kitchen");
    }

    #[test]
    fn resolve_unknown_speaker_is_not_found() {
        let controller = test_controller(None);
        assert!(matches!(
            controller.resolve(Some("Attic")),
            Err(RoomcastError::SpeakerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn play_preset_with_unknown_preset_is_not_found() {
        let controller = test_controller(None);
        let result = controller.play_preset(Some("Kitchen"), "42").await;
        assert!(matches!(result, Err(RoomcastError::PresetNotFound(_))));
    }
}
