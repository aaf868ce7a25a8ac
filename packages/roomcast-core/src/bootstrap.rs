//! Service wiring.
//!
//! Builds the service graph out of a [`Config`] so binaries don't have to
//! know how the pieces connect (or carry the HTTP client / cancellation
//! dependencies themselves).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::context::NetworkContext;
use crate::library::MediaLibrary;
use crate::services::{DiscoveryService, SpeakerController};
use crate::state::{Config, SpeakerRegistry};

/// The wired-up service graph.
pub struct BootstrappedServices {
    /// Command orchestration against speakers.
    pub controller: Arc<SpeakerController>,
    /// Background discovery service.
    pub discovery: Arc<DiscoveryService>,
    /// Registry of discovered speakers.
    pub registry: Arc<SpeakerRegistry>,
    /// Media library served under `/music/`.
    pub library: Arc<MediaLibrary>,
    /// Advertised host/port.
    pub network: NetworkContext,
    shutdown: CancellationToken,
    discovery_task: Mutex<Option<JoinHandle<()>>>,
}

/// Builds the service graph.
///
/// One `reqwest` client is shared by every component that talks to
/// speakers, so connection pools are reused across SOAP calls and
/// description fetches.
#[must_use]
pub fn bootstrap_services(
    config: &Config,
    network: NetworkContext,
    library: Arc<MediaLibrary>,
) -> BootstrappedServices {
    let http = reqwest::Client::new();
    let registry = Arc::new(SpeakerRegistry::new());

    let discovery = Arc::new(DiscoveryService::new(
        http.clone(),
        Arc::clone(&registry),
        network.clone(),
        config.discovery_config(),
        Duration::from_secs(config.discovery_refresh_interval),
    ));

    let controller = Arc::new(SpeakerController::new(
        http,
        Arc::clone(&registry),
        Arc::clone(&library),
        network.clone(),
        config.default_speaker.clone(),
        config.volume_step,
    ));

    BootstrappedServices {
        controller,
        discovery,
        registry,
        library,
        network,
        shutdown: CancellationToken::new(),
        discovery_task: Mutex::new(None),
    }
}

impl BootstrappedServices {
    /// Starts the background tasks (initial + periodic discovery).
    pub fn start_background_tasks(&self) {
        let mut task = self.discovery_task.lock();
        if task.is_none() {
            *task = Some(self.discovery.spawn());
        }
    }

    /// Token cancelled when [`BootstrappedServices::shutdown`] runs; hand it
    /// to [`crate::api::start_server`] for graceful HTTP shutdown.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Builds the HTTP application state.
    #[must_use]
    pub fn app_state(&self, site_dir: Option<PathBuf>) -> AppState {
        AppState {
            controller: Arc::clone(&self.controller),
            discovery: Arc::clone(&self.discovery),
            registry: Arc::clone(&self.registry),
            library: Arc::clone(&self.library),
            network: self.network.clone(),
            site_dir,
        }
    }

    /// Stops the background tasks and releases the HTTP server.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.discovery.shutdown();
        let task = self.discovery_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                log::warn!("[Bootstrap] discovery task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_services() -> BootstrappedServices {
        let config = Config {
            // Keep tests off the network.
            discovery_multicast: false,
            discovery_broadcast: false,
            discovery_refresh_interval: 0,
            ..Config::default()
        };
        let network = NetworkContext::explicit(8080, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)));
        let library = Arc::new(MediaLibrary::new("/nonexistent"));
        bootstrap_services(&config, network, library)
    }

    #[tokio::test]
    async fn shutdown_without_start_is_harmless() {
        let services = test_services();
        services.shutdown().await;
    }

    #[tokio::test]
    async fn background_tasks_start_once_and_stop() {
        let services = test_services();
        services.start_background_tasks();
        services.start_background_tasks(); // idempotent

        tokio::time::timeout(Duration::from_secs(1), async {
            while !services.registry.is_ready() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry should become ready");

        tokio::time::timeout(Duration::from_secs(1), services.shutdown())
            .await
            .expect("shutdown should complete");
    }

    #[test]
    fn app_state_carries_site_dir() {
        let services = test_services();
        let state = services.app_state(Some(PathBuf::from("site")));
        assert_eq!(state.site_dir.as_deref(), Some(std::path::Path::new("site")));
    }
}
