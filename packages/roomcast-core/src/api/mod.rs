//! HTTP API layer.
//!
//! Provides the shared [`AppState`], router construction, and server
//! startup with graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::context::NetworkContext;
use crate::library::MediaLibrary;
use crate::services::{DiscoveryService, SpeakerController};
use crate::state::SpeakerRegistry;

pub mod http;
pub mod response;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or serve on the configured address.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// A thin bundle of service handles; all business logic lives in the
/// services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Command orchestration against speakers.
    pub controller: Arc<SpeakerController>,
    /// Background discovery service.
    pub discovery: Arc<DiscoveryService>,
    /// Registry of discovered speakers.
    pub registry: Arc<SpeakerRegistry>,
    /// Media library served under `/music/`.
    pub library: Arc<MediaLibrary>,
    /// Advertised host/port for building media URLs.
    pub network: NetworkContext,
    /// Static site served under `/ui/`, when configured.
    pub site_dir: Option<PathBuf>,
}

/// Starts the HTTP server and runs it until the token is cancelled.
pub async fn start_server(
    state: AppState,
    bind_addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    log::info!("Server listening on http://{}", bind_addr);

    let app = http::create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
