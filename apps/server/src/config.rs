//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to.
    /// Override: `ROOMCAST_BIND_PORT`
    pub bind_port: u16,

    /// IP address to advertise to Sonos speakers in media URLs.
    /// This must be an address the speakers can reach; if unset, the local
    /// IP is auto-detected.
    /// Override: `ROOMCAST_ADVERTISE_IP`
    pub advertise_ip: Option<IpAddr>,

    /// Speaker addressed when a command names none.
    /// Override: `ROOMCAST_DEFAULT_SPEAKER`
    pub default_speaker: Option<String>,

    /// Directory of MP3 files served under `/music/`.
    pub media_dir: PathBuf,

    /// Prebuilt static site served under `/ui/`.
    pub site_dir: Option<PathBuf>,

    /// Interval in seconds between automatic discovery refreshes (0 disables).
    /// Override: `ROOMCAST_DISCOVERY_REFRESH_INTERVAL`
    pub discovery_refresh_interval: u64,

    /// Enable SSDP multicast discovery.
    pub discovery_multicast: bool,

    /// Enable SSDP broadcast discovery.
    pub discovery_broadcast: bool,

    /// Volume increment for the volume-up/volume-down commands.
    pub volume_step: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_port: 8080,
            advertise_ip: None,
            default_speaker: None,
            media_dir: PathBuf::from("media"),
            site_dir: None,
            discovery_refresh_interval: 300,
            discovery_multicast: true,
            discovery_broadcast: true,
            volume_step: 5,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ROOMCAST_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("ROOMCAST_ADVERTISE_IP") {
            if let Ok(ip) = val.parse() {
                self.advertise_ip = Some(ip);
            }
        }

        if let Ok(val) = std::env::var("ROOMCAST_DEFAULT_SPEAKER") {
            if !val.is_empty() {
                self.default_speaker = Some(val);
            }
        }

        if let Ok(val) = std::env::var("ROOMCAST_DISCOVERY_REFRESH_INTERVAL") {
            if let Ok(interval) = val.parse() {
                self.discovery_refresh_interval = interval;
            }
        }

        // Note: ROOMCAST_MEDIA_DIR and ROOMCAST_SITE_DIR are handled by clap
        // via #[arg(env = ...)] in main.rs
    }

    /// Converts to roomcast-core's Config type.
    pub fn to_core_config(&self) -> roomcast_core::Config {
        roomcast_core::Config {
            default_speaker: self.default_speaker.clone(),
            discovery_refresh_interval: self.discovery_refresh_interval,
            discovery_multicast: self.discovery_multicast,
            discovery_broadcast: self.discovery_broadcast,
            volume_step: self.volume_step,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_port_8080() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_port, 8080);
        assert!(config.advertise_ip.is_none());
        assert!(config.default_speaker.is_none());
        assert_eq!(config.media_dir, PathBuf::from("media"));
        assert_eq!(config.volume_step, 5);
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = "bind_port: 9000\ndefault_speaker: Kitchen\ndiscovery_broadcast: false\n";
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.default_speaker.as_deref(), Some("Kitchen"));
        assert!(!config.discovery_broadcast);
        // Untouched fields keep their defaults.
        assert!(config.discovery_multicast);
        assert_eq!(config.discovery_refresh_interval, 300);
    }

    #[test]
    fn core_config_conversion() {
        let yaml = "default_speaker: Den\nvolume_step: 2\n";
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        let core = config.to_core_config();
        assert_eq!(core.default_speaker.as_deref(), Some("Den"));
        assert_eq!(core.volume_step, 2);
        assert_eq!(core.ssdp_send_count, 3);
    }
}
