//! Sonos UPnP service definitions.
//!
//! Single source of truth for the service URNs and control paths used by the
//! SOAP command modules.

use serde::Serialize;

/// Sonos UPnP services this application issues commands against.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SonosService {
    /// Audio/Video transport control (play, pause, seek, queue management).
    AVTransport,
    /// Per-speaker volume and mute control.
    RenderingControl,
    /// Browsing of the speaker's content, including its play queue.
    ContentDirectory,
    /// Device metadata such as the configured zone (room) name.
    DeviceProperties,
}

impl SonosService {
    /// Returns the UPnP service URN for SOAP requests.
    #[must_use]
    pub fn urn(&self) -> &'static str {
        match self {
            Self::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Self::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Self::ContentDirectory => "urn:schemas-upnp-org:service:ContentDirectory:1",
            Self::DeviceProperties => "urn:schemas-upnp-org:service:DeviceProperties:1",
        }
    }

    /// Returns the UPnP control endpoint path for SOAP requests.
    #[must_use]
    pub fn control_path(&self) -> &'static str {
        match self {
            Self::AVTransport => "/MediaRenderer/AVTransport/Control",
            Self::RenderingControl => "/MediaRenderer/RenderingControl/Control",
            Self::ContentDirectory => "/MediaServer/ContentDirectory/Control",
            Self::DeviceProperties => "/DeviceProperties/Control",
        }
    }

    /// Returns a human-readable name for this service.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AVTransport => "AVTransport",
            Self::RenderingControl => "RenderingControl",
            Self::ContentDirectory => "ContentDirectory",
            Self::DeviceProperties => "DeviceProperties",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_paths_match_service_tree() {
        // MediaRenderer services live under /MediaRenderer, ContentDirectory
        // under /MediaServer, DeviceProperties at the device root.
        assert!(SonosService::AVTransport
            .control_path()
            .starts_with("/MediaRenderer/"));
        assert!(SonosService::RenderingControl
            .control_path()
            .starts_with("/MediaRenderer/"));
        assert!(SonosService::ContentDirectory
            .control_path()
            .starts_with("/MediaServer/"));
        assert_eq!(
            SonosService::DeviceProperties.control_path(),
            "/DeviceProperties/Control"
        );
    }

    #[test]
    fn urns_carry_service_name() {
        for service in [
            SonosService::AVTransport,
            SonosService::RenderingControl,
            SonosService::ContentDirectory,
            SonosService::DeviceProperties,
        ] {
            assert!(service.urn().contains(service.name()));
        }
    }
}
