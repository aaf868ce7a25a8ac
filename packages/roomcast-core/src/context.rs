//! Network configuration context.
//!
//! Bundles the host/port this server advertises to speakers. Sonos devices
//! fetch media from us over the LAN, so URLs handed to them must use an
//! address the speakers can reach - never localhost or a bind-all address.

use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::RwLock;

/// Network configuration shared across services.
///
/// # Modes
///
/// - **Explicit**: the advertise IP is fixed by configuration.
/// - **Auto-detect**: the local IP is detected at startup and re-checked by
///   the discovery service, since laptops and DHCP move addresses around.
#[derive(Clone)]
pub struct NetworkContext {
    port: u16,
    advertise_ip: Arc<RwLock<String>>,
    ip_detector: Option<Arc<dyn IpDetector>>,
}

impl NetworkContext {
    /// Creates a context with a fixed advertise address.
    #[must_use]
    pub fn explicit(port: u16, advertise_ip: IpAddr) -> Self {
        Self {
            port,
            advertise_ip: Arc::new(RwLock::new(advertise_ip.to_string())),
            ip_detector: None,
        }
    }

    /// Creates a context that detects (and keeps re-detecting) the local IP.
    ///
    /// # Errors
    /// Fails when the initial detection fails; in that case the caller should
    /// ask the operator for an explicit advertise IP.
    pub fn auto_detect(
        port: u16,
        ip_detector: Arc<dyn IpDetector>,
    ) -> Result<Self, NetworkError> {
        let ip = ip_detector.detect()?;
        Ok(Self {
            port,
            advertise_ip: Arc::new(RwLock::new(ip)),
            ip_detector: Some(ip_detector),
        })
    }

    /// Returns the advertised port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the advertised IP address.
    #[must_use]
    pub fn advertise_ip(&self) -> String {
        self.advertise_ip.read().clone()
    }

    /// Re-runs IP detection and updates the advertised address on change.
    ///
    /// No-op in explicit mode. Detection failures keep the previous address.
    pub fn refresh_ip(&self) {
        let Some(detector) = &self.ip_detector else {
            return;
        };
        match detector.detect() {
            Ok(ip) => {
                let mut current = self.advertise_ip.write();
                if *current != ip {
                    log::info!("[Network] advertise IP changed: {} -> {}", current, ip);
                    *current = ip;
                }
            }
            Err(e) => {
                log::warn!("[Network] IP re-detection failed, keeping {}: {}", self.advertise_ip(), e);
            }
        }
    }

    /// Returns a `UrlBuilder` for the current advertised address.
    #[must_use]
    pub fn url_builder(&self) -> UrlBuilder {
        UrlBuilder::new(self.advertise_ip(), self.port)
    }
}

/// Trait for detecting the local IP address.
pub trait IpDetector: Send + Sync {
    /// Detects the local IP address.
    fn detect(&self) -> Result<String, NetworkError>;
}

/// Default IP detector using the system's routing table.
#[derive(Debug, Clone, Default)]
pub struct LocalIpDetector;

impl LocalIpDetector {
    /// Creates a new `LocalIpDetector` wrapped in an Arc.
    #[must_use]
    pub fn arc() -> Arc<dyn IpDetector> {
        Arc::new(Self)
    }
}

impl IpDetector for LocalIpDetector {
    fn detect(&self) -> Result<String, NetworkError> {
        local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .map_err(|e| NetworkError::Detection(e.to_string()))
    }
}

/// Errors that can occur during network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Could not detect the local IP address.
    #[error("failed to detect local IP: {0}")]
    Detection(String),
}

/// Builds the URLs external devices use to reach this server.
pub struct UrlBuilder {
    ip: String,
    port: u16,
}

impl UrlBuilder {
    /// Creates a builder for the given advertised address.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }

    /// Base URL of the server (e.g. `http://192.168.1.5:8080`).
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }

    /// URL of a media file, given its path relative to the media root.
    ///
    /// Each path segment is percent-encoded; the separators are kept.
    #[must_use]
    pub fn media_url(&self, relative_path: &str) -> String {
        let encoded: Vec<String> = relative_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/music/{}", self.base_url(), encoded.join("/"))
    }

    /// URL the root endpoint redirects to.
    #[must_use]
    pub fn docs_url(&self) -> String {
        format!("{}/ui/docs/controller", self.base_url())
    }
}
