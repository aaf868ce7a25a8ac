//! Shared types for Sonos speaker discovery.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

/// Discovery method identifier, tracked per speaker for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryMethod {
    /// SSDP multicast to 239.255.255.250:1900.
    Multicast,
    /// SSDP broadcast (directed per-interface + limited 255.255.255.255).
    Broadcast,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Multicast => write!(f, "SSDP multicast"),
            Self::Broadcast => write!(f, "SSDP broadcast"),
        }
    }
}

/// Errors that can occur during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Failed to bind a UDP socket for discovery.
    #[error("failed to bind UDP socket: {0}")]
    SocketBind(#[source] std::io::Error),

    /// No usable network interfaces found.
    #[error("no usable network interfaces found")]
    NoInterfaces,

    /// Every enabled discovery method was turned off in configuration.
    #[error("all discovery methods are disabled")]
    AllMethodsDisabled,
}

/// Convenient Result alias for speaker discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A discovered Sonos speaker with resolved metadata.
///
/// This is what the registry stores and the API serves. `name` is the zone
/// name the household configured (e.g. "Kitchen"), which is also how
/// commands address speakers.
#[derive(Debug, Serialize, Clone)]
pub struct Speaker {
    /// Display name used to address the speaker (zone name when known).
    pub name: String,
    /// IPv4 address of the speaker.
    pub address: String,
    /// Room (zone) name reported by the device.
    pub room: String,
    /// Canonical UUID (normalized `RINCON_xxx`).
    pub uuid: String,
    /// Model name (e.g. "Sonos One").
    #[serde(rename = "modelName", skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

/// Known Sonos infrastructure device models that can't play audio.
const INFRASTRUCTURE_MODELS: &[&str] = &["boost", "bridge"];

impl Speaker {
    /// Returns true if this is a non-playable infrastructure device.
    #[must_use]
    pub fn is_infrastructure_device(&self) -> bool {
        self.model_name.as_deref().is_some_and(|m| {
            let model = m.to_lowercase();
            INFRASTRUCTURE_MODELS.iter().any(|infra| model.contains(infra))
        })
    }
}

/// Raw discovery result before the device description has been fetched.
#[derive(Debug, Clone)]
pub struct DiscoveredSpeaker {
    /// IP address the reply came from.
    pub ip: String,
    /// Raw UUID as discovered (may need normalization).
    pub uuid: String,
    /// SSDP LOCATION URL if present (authoritative for the description).
    pub location: Option<String>,
    /// Which discovery methods found this speaker.
    pub methods: HashSet<DiscoveryMethod>,
}

impl DiscoveredSpeaker {
    /// Creates a discovery record from a single response.
    #[must_use]
    pub fn new(ip: String, uuid: String, method: DiscoveryMethod) -> Self {
        Self {
            ip,
            uuid,
            location: None,
            methods: HashSet::from([method]),
        }
    }

    /// Creates a discovery record carrying a LOCATION URL.
    #[must_use]
    pub fn with_location(ip: String, uuid: String, location: String, method: DiscoveryMethod) -> Self {
        let mut speaker = Self::new(ip, uuid, method);
        speaker.location = Some(location);
        speaker
    }

    /// Merges a duplicate discovery of the same device into this record.
    ///
    /// Unions the method set and keeps the first LOCATION seen.
    pub fn merge(&mut self, other: DiscoveredSpeaker) {
        self.methods.extend(other.methods);
        if self.location.is_none() {
            self.location = other.location;
        }
    }
}

/// Device information parsed from the device description XML.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Canonical UUID from the UDN field.
    pub uuid: String,
    /// Friendly name for display.
    pub friendly_name: String,
    /// Model name (e.g. "Sonos One").
    pub model_name: Option<String>,
}

/// Normalizes a Sonos UUID to canonical form for deduplication.
///
/// Handles the UUID shapes seen in the wild:
/// - `uuid:` prefix (from UPnP UDN)
/// - `::urn:schemas-upnp-org:device:ZonePlayer:1` suffix (from USN)
/// - `:<digits>` suffixes (group/topology IDs like `RINCON_...01400:58`)
/// - `_MS`, `_MR`, `_LR` subdevice suffixes
#[must_use]
pub fn normalize_uuid(raw: &str) -> String {
    let mut uuid = raw.strip_prefix("uuid:").unwrap_or(raw).to_string();

    if let Some(idx) = uuid.find("::") {
        uuid.truncate(idx);
    }

    // Only strip :<digits> from RINCON_ identifiers, to avoid mangling
    // anything IPv6-shaped.
    if uuid.contains("RINCON_") {
        if let Some(idx) = uuid.rfind(':') {
            let suffix = &uuid[idx + 1..];
            if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
                uuid.truncate(idx);
            }
        }
    }

    const SUFFIXES: &[&str] = &["_MS", "_MR", "_LR"];
    loop {
        let before = uuid.len();
        for suffix in SUFFIXES {
            if let Some(stripped) = uuid.strip_suffix(suffix) {
                uuid = stripped.to_string();
            }
        }
        if uuid.len() == before {
            break;
        }
    }

    uuid
}

/// Interface name prefixes belonging to virtual/container interfaces.
const VIRTUAL_INTERFACE_PREFIXES: &[&str] = &[
    "lo", "docker", "veth", "br-", "virbr", "vmnet", "vbox", "tun", "tap",
];

/// Checks whether an interface name belongs to a virtual/container interface.
#[must_use]
pub fn is_virtual_interface(name: &str) -> bool {
    let name = name.to_lowercase();
    VIRTUAL_INTERFACE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uuid_strips_prefix_and_urn_suffix() {
        assert_eq!(normalize_uuid("uuid:RINCON_ABC123"), "RINCON_ABC123");
        assert_eq!(
            normalize_uuid("uuid:RINCON_ABC123::urn:schemas-upnp-org:device:ZonePlayer:1"),
            "RINCON_ABC123"
        );
    }

    #[test]
    fn normalize_uuid_strips_topology_and_subdevice_suffixes() {
        assert_eq!(normalize_uuid("RINCON_ABC12301400:58"), "RINCON_ABC12301400");
        assert_eq!(normalize_uuid("RINCON_ABC123_MS"), "RINCON_ABC123");
        assert_eq!(normalize_uuid("RINCON_ABC123_MS_LR"), "RINCON_ABC123");
    }

    #[test]
    fn normalize_uuid_preserves_non_rincon() {
        assert_eq!(normalize_uuid("some:123"), "some:123");
    }

    #[test]
    fn virtual_interfaces_are_filtered() {
        assert!(is_virtual_interface("lo"));
        assert!(is_virtual_interface("docker0"));
        assert!(is_virtual_interface("veth12ab"));
        assert!(!is_virtual_interface("eth0"));
        assert!(!is_virtual_interface("en0"));
        assert!(!is_virtual_interface("wlan0"));
    }

    #[test]
    fn merge_unions_methods_and_keeps_location() {
        let mut first = DiscoveredSpeaker::new(
            "192.168.1.10".to_string(),
            "RINCON_ABC123".to_string(),
            DiscoveryMethod::Broadcast,
        );
        let second = DiscoveredSpeaker::with_location(
            "192.168.1.10".to_string(),
            "RINCON_ABC123".to_string(),
            "http://192.168.1.10:1400/xml/device_description.xml".to_string(),
            DiscoveryMethod::Multicast,
        );

        first.merge(second);

        assert!(first.methods.contains(&DiscoveryMethod::Multicast));
        assert!(first.methods.contains(&DiscoveryMethod::Broadcast));
        assert!(first.location.is_some());
    }

    #[test]
    fn infrastructure_models_are_flagged() {
        let mut speaker = Speaker {
            name: "Hallway".to_string(),
            address: "192.168.1.30".to_string(),
            room: "Hallway".to_string(),
            uuid: "RINCON_X".to_string(),
            model_name: Some("Sonos Boost".to_string()),
        };
        assert!(speaker.is_infrastructure_device());

        speaker.model_name = Some("Sonos One".to_string());
        assert!(!speaker.is_infrastructure_device());

        speaker.model_name = None;
        assert!(!speaker.is_infrastructure_device());
    }
}
