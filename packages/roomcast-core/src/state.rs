//! Core configuration and runtime state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::sonos::discovery::{DiscoveryConfig, Speaker, SsdpConfig};

/// Core application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Speaker addressed when a command names none.
    pub default_speaker: Option<String>,

    // Discovery
    /// Interval between automatic discovery refreshes (seconds, 0 disables).
    pub discovery_refresh_interval: u64,
    /// Enable SSDP multicast discovery.
    pub discovery_multicast: bool,
    /// Enable SSDP broadcast discovery.
    pub discovery_broadcast: bool,
    /// Number of M-SEARCH packets to send per interface.
    pub ssdp_send_count: u64,
    /// Delay between M-SEARCH retransmissions (milliseconds).
    pub ssdp_retry_delay_ms: u64,
    /// Total per-pass discovery timeout (milliseconds).
    pub ssdp_timeout_ms: u64,
    /// How many device descriptions to fetch concurrently.
    pub max_concurrent_fetches: usize,

    // Commands
    /// Volume increment applied by the volume-up/volume-down commands.
    pub volume_step: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_speaker: None,
            discovery_refresh_interval: 300,
            discovery_multicast: true,
            discovery_broadcast: true,
            ssdp_send_count: 3,
            ssdp_retry_delay_ms: 800,
            ssdp_timeout_ms: 5000,
            max_concurrent_fetches: 8,
            volume_step: 5,
        }
    }
}

impl Config {
    /// Builds the discovery configuration out of the tuning fields.
    #[must_use]
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            multicast: self.discovery_multicast,
            broadcast: self.discovery_broadcast,
            ssdp: SsdpConfig {
                send_count: self.ssdp_send_count,
                retry_delay: Duration::from_millis(self.ssdp_retry_delay_ms),
                discovery_timeout: Duration::from_millis(self.ssdp_timeout_ms),
                ..SsdpConfig::default()
            },
            max_concurrent_fetches: self.max_concurrent_fetches,
        }
    }
}

/// In-memory registry of discovered speakers, keyed by normalized UUID.
///
/// Upsert-only: a speaker missing from one discovery round is kept, since
/// flaky multicast regularly drops devices from individual passes. Lookups
/// go by zone name first, then room.
#[derive(Default)]
pub struct SpeakerRegistry {
    speakers: DashMap<String, Speaker>,
    ready: AtomicBool,
}

impl SpeakerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates the given speakers.
    pub fn upsert(&self, speakers: Vec<Speaker>) {
        for speaker in speakers {
            self.speakers.insert(speaker.uuid.clone(), speaker);
        }
    }

    /// Looks up a speaker by name (exact), falling back to room name.
    /// Matching is case-insensitive.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Speaker> {
        let by_name = self
            .speakers
            .iter()
            .find(|entry| entry.value().name.eq_ignore_ascii_case(name))
            .map(|entry| entry.value().clone());
        if by_name.is_some() {
            return by_name;
        }

        self.speakers
            .iter()
            .find(|entry| entry.value().room.eq_ignore_ascii_case(name))
            .map(|entry| entry.value().clone())
    }

    /// Returns all known speakers, sorted by name.
    #[must_use]
    pub fn all(&self) -> Vec<Speaker> {
        let mut speakers: Vec<Speaker> = self
            .speakers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        speakers.sort_by(|a, b| a.name.cmp(&b.name));
        speakers
    }

    /// Number of known speakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    /// Returns true when no speakers are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Marks the initial discovery pass as complete.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Returns true once the initial discovery pass has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speaker(name: &str, room: &str, uuid: &str) -> Speaker {
        Speaker {
            name: name.to_string(),
            address: "192.168.1.10".to_string(),
            room: room.to_string(),
            uuid: uuid.to_string(),
            model_name: Some("Sonos One".to_string()),
        }
    }

    #[test]
    fn upsert_replaces_by_uuid() {
        let registry = SpeakerRegistry::new();
        registry.upsert(vec![speaker("Kitchen", "Kitchen", "RINCON_A")]);
        registry.upsert(vec![speaker("Kitchen (2)", "Kitchen", "RINCON_A")]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.all()[0].name, "Kitchen (2)");
    }

    #[test]
    fn find_matches_name_then_room() {
        let registry = SpeakerRegistry::new();
        registry.upsert(vec![
            speaker("Kitchen", "Kitchen", "RINCON_A"),
            speaker("Sonos One", "Den", "RINCON_B"),
        ]);

        assert_eq!(registry.find("Kitchen").unwrap().uuid, "RINCON_A");
        assert_eq!(registry.find("kitchen").unwrap().uuid, "RINCON_A");
        assert_eq!(registry.find("Den").unwrap().uuid, "RINCON_B");
        assert!(registry.find("Attic").is_none());
    }

    #[test]
    fn missing_speakers_are_not_evicted() {
        let registry = SpeakerRegistry::new();
        registry.upsert(vec![
            speaker("Kitchen", "Kitchen", "RINCON_A"),
            speaker("Den", "Den", "RINCON_B"),
        ]);
        // A later, partial round only sees one speaker.
        registry.upsert(vec![speaker("Kitchen", "Kitchen", "RINCON_A")]);

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn all_is_sorted_by_name() {
        let registry = SpeakerRegistry::new();
        registry.upsert(vec![
            speaker("Zebra", "Z", "RINCON_Z"),
            speaker("Attic", "A", "RINCON_A"),
        ]);

        let names: Vec<String> = registry.all().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Attic", "Zebra"]);
    }

    #[test]
    fn ready_flag_flips_once() {
        let registry = SpeakerRegistry::new();
        assert!(!registry.is_ready());
        registry.mark_ready();
        assert!(registry.is_ready());
    }

    #[test]
    fn config_defaults_are_sane() {
        let config = Config::default();
        assert!(config.default_speaker.is_none());
        assert_eq!(config.volume_step, 5);
        let discovery = config.discovery_config();
        assert!(discovery.multicast);
        assert_eq!(discovery.ssdp.send_count, 3);
        assert_eq!(discovery.ssdp.discovery_timeout, Duration::from_secs(5));
    }
}
