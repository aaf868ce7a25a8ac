//! Background speaker discovery.
//!
//! Runs the initial discovery pass at startup (gating the readiness probe),
//! then keeps the registry fresh with periodic refreshes and on-demand
//! refreshes triggered from the API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::NetworkContext;
use crate::sonos::discovery::{self, DiscoveryConfig, DiscoveryResult, Speaker};
use crate::state::SpeakerRegistry;

/// Service owning the discovery loop.
pub struct DiscoveryService {
    http: Client,
    registry: Arc<SpeakerRegistry>,
    network: NetworkContext,
    config: DiscoveryConfig,
    refresh_interval: Duration,
    refresh: Notify,
    cancel: CancellationToken,
}

impl DiscoveryService {
    /// Creates the service.
    ///
    /// `refresh_interval` of zero disables periodic refreshes; manual
    /// refreshes via [`DiscoveryService::run_once`] and
    /// [`DiscoveryService::trigger_refresh`] still work.
    pub fn new(
        http: Client,
        registry: Arc<SpeakerRegistry>,
        network: NetworkContext,
        config: DiscoveryConfig,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            http,
            registry,
            network,
            config,
            refresh_interval,
            refresh: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Runs one discovery pass and folds the result into the registry.
    ///
    /// Returns the speakers found by this pass (not the whole registry).
    pub async fn run_once(&self) -> DiscoveryResult<Vec<Speaker>> {
        // Laptops roam; make sure media URLs keep pointing at us.
        self.network.refresh_ip();

        let found = discovery::discover_speakers(&self.http, &self.config).await?;
        log::info!("[Discovery] pass complete, {} speaker(s) found", found.len());
        for speaker in &found {
            log::info!(
                "[Discovery]   {} (room: {}) at {}",
                speaker.name,
                speaker.room,
                speaker.address
            );
        }

        self.registry.upsert(found.clone());
        Ok(found)
    }

    /// Wakes the background loop for an immediate refresh.
    pub fn trigger_refresh(&self) {
        self.refresh.notify_one();
    }

    /// Requests the background loop to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Spawns the background discovery task.
    ///
    /// The initial pass marks the registry ready when it finishes, whether
    /// or not it found anything - readiness means "discovery has been
    /// attempted", not "speakers exist".
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            log::info!("[Discovery] running initial discovery pass");
            if let Err(e) = service.run_once().await {
                log::warn!("[Discovery] initial pass failed: {}", e);
            }
            service.registry.mark_ready();
            log::info!("[Discovery] initial pass done, readiness gate open");

            loop {
                let periodic = async {
                    if service.refresh_interval.is_zero() {
                        std::future::pending::<()>().await;
                    } else {
                        tokio::time::sleep(service.refresh_interval).await;
                    }
                };

                tokio::select! {
                    _ = service.cancel.cancelled() => {
                        log::debug!("[Discovery] background task stopping");
                        break;
                    }
                    _ = service.refresh.notified() => {
                        log::info!("[Discovery] refresh requested");
                    }
                    _ = periodic => {
                        log::debug!("[Discovery] periodic refresh");
                    }
                }

                if let Err(e) = service.run_once().await {
                    log::warn!("[Discovery] refresh failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_service(refresh_interval: Duration) -> Arc<DiscoveryService> {
        Arc::new(DiscoveryService::new(
            Client::new(),
            Arc::new(SpeakerRegistry::new()),
            NetworkContext::explicit(8080, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5))),
            // Both methods off so tests never touch the network.
            DiscoveryConfig {
                multicast: false,
                broadcast: false,
                ..DiscoveryConfig::default()
            },
            refresh_interval,
        ))
    }

    #[tokio::test]
    async fn initial_pass_marks_registry_ready_even_on_failure() {
        let service = test_service(Duration::ZERO);
        assert!(!service.registry.is_ready());

        let handle = service.spawn();
        // The disabled config makes run_once fail immediately; readiness
        // must flip regardless.
        tokio::time::timeout(Duration::from_secs(1), async {
            while !service.registry.is_ready() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry should become ready");

        service.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn shutdown_stops_background_task() {
        let service = test_service(Duration::from_secs(3600));
        let handle = service.spawn();

        service.shutdown();
        let joined = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(joined.is_ok(), "task should stop after shutdown");
    }
}
