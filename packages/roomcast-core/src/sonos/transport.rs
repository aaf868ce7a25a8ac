//! AV Transport commands for Sonos speakers.
//!
//! Play, pause, skip, seek, and transport state queries, with retry logic
//! for transient SOAP faults on the state-changing actions.

use std::time::Duration;

use reqwest::Client;

use super::services::SonosService;
use super::soap::{SoapError, SoapRequestBuilder, SoapResult};
use super::utils::extract_xml_text;

/// Retry delays for transient SOAP errors (exponential backoff).
const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

/// Executes a SOAP request with retry logic for transient errors.
///
/// Retries transient faults (UPnP 701/714/716) and timeouts; any other error
/// aborts immediately.
pub(crate) async fn with_retry<F, Fut>(action: &str, mut operation: F) -> SoapResult<String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = SoapResult<String>>,
{
    let mut last_error = None;
    for (attempt, &delay_ms) in std::iter::once(&0)
        .chain(RETRY_DELAYS_MS.iter())
        .enumerate()
    {
        if attempt > 0 {
            log::info!(
                "[Sonos] retrying {} (attempt {}/{}) after {}ms",
                action,
                attempt + 1,
                RETRY_DELAYS_MS.len() + 1,
                delay_ms
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        match operation().await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_transient() => {
                log::warn!("[Sonos] {} transient error: {}", action, e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.expect("retry loop should have set last_error"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport State
// ─────────────────────────────────────────────────────────────────────────────

/// AV Transport state as reported by `GetTransportInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    Playing,
    PausedPlayback,
    Stopped,
    Transitioning,
    /// Any state this application doesn't act on (e.g. NO_MEDIA_PRESENT).
    Other(String),
}

impl TransportState {
    /// Parses the `CurrentTransportState` value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PLAYING" => Self::Playing,
            "PAUSED_PLAYBACK" => Self::PausedPlayback,
            "STOPPED" => Self::Stopped,
            "TRANSITIONING" => Self::Transitioning,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if the speaker is actively playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Playing => write!(f, "PLAYING"),
            Self::PausedPlayback => write!(f, "PAUSED_PLAYBACK"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Transitioning => write!(f, "TRANSITIONING"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Snapshot of a speaker's transport status.
#[derive(Debug, Clone)]
pub struct TransportInfo {
    /// Current transport state.
    pub state: TransportState,
    /// Transport status (OK or an error string).
    pub status: String,
    /// Play speed (Sonos always reports "1").
    pub speed: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Starts (or resumes) playback of whatever the transport points at.
pub async fn play(client: &Client, ip: &str) -> SoapResult<()> {
    with_retry("Play", || {
        SoapRequestBuilder::new(client, ip)
            .service(SonosService::AVTransport)
            .action("Play")
            .instance_id()
            .arg("Speed", "1")
            .send()
    })
    .await?;
    Ok(())
}

/// Pauses playback.
///
/// A 701 fault means the transport cannot pause because nothing is playing;
/// that is treated as success so repeated pauses are idempotent.
pub async fn pause(client: &Client, ip: &str) -> SoapResult<()> {
    let result = SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("Pause")
        .instance_id()
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(SoapError::Fault(msg)) if msg.contains("701") => {
            log::debug!("[Sonos] Pause on {} with nothing playing (ignoring 701)", ip);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Skips to the next track in the queue.
pub async fn next_track(client: &Client, ip: &str) -> SoapResult<()> {
    SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("Next")
        .instance_id()
        .send()
        .await?;
    Ok(())
}

/// Skips back to the previous track in the queue.
pub async fn previous_track(client: &Client, ip: &str) -> SoapResult<()> {
    SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("Previous")
        .instance_id()
        .send()
        .await?;
    Ok(())
}

/// Seeks to a 1-based track number within the queue.
pub async fn seek_to_track(client: &Client, ip: &str, track: u32) -> SoapResult<()> {
    with_retry("Seek", || {
        SoapRequestBuilder::new(client, ip)
            .service(SonosService::AVTransport)
            .action("Seek")
            .instance_id()
            .arg("Unit", "TRACK_NR")
            .arg("Target", track.to_string())
            .send()
    })
    .await?;
    Ok(())
}

/// Points the transport at the speaker's own queue.
///
/// This is the URI form Sonos uses internally for queue playback; it must be
/// set before `Play` after the queue has been rebuilt.
pub async fn set_queue_source(client: &Client, ip: &str, speaker_uuid: &str) -> SoapResult<()> {
    let queue_uri = format!("x-rincon-queue:{}#0", speaker_uuid);
    log::debug!("[Sonos] SetAVTransportURI {} -> {}", ip, queue_uri);

    with_retry("SetAVTransportURI", || {
        SoapRequestBuilder::new(client, ip)
            .service(SonosService::AVTransport)
            .action("SetAVTransportURI")
            .instance_id()
            .arg("CurrentURI", &queue_uri)
            .arg("CurrentURIMetaData", "")
            .send()
    })
    .await?;
    Ok(())
}

/// Queries the current transport state.
pub async fn get_transport_info(client: &Client, ip: &str) -> SoapResult<TransportInfo> {
    let response = SoapRequestBuilder::new(client, ip)
        .service(SonosService::AVTransport)
        .action("GetTransportInfo")
        .instance_id()
        .send()
        .await?;

    let state = extract_xml_text(&response, "CurrentTransportState").ok_or(SoapError::Parse)?;
    let status = extract_xml_text(&response, "CurrentTransportStatus").unwrap_or_default();
    let speed = extract_xml_text(&response, "CurrentSpeed").unwrap_or_else(|| "1".to_string());

    Ok(TransportInfo {
        state: TransportState::parse(&state),
        status,
        speed,
    })
}
