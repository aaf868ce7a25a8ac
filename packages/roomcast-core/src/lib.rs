//! Roomcast Core - shared library for the Roomcast server.
//!
//! Roomcast is a local-network control surface for Sonos speakers: it
//! discovers speakers over SSDP, translates simple REST commands into
//! UPnP/SOAP calls, and hosts the MP3 files the speakers stream back.
//!
//! # Architecture
//!
//! - [`sonos`]: speaker discovery and UPnP/SOAP control
//! - [`library`]: media directory scanning and playlist building
//! - [`state`]: configuration and the speaker registry
//! - [`context`]: advertised network address and URL building
//! - [`services`]: command orchestration and background discovery
//! - [`bootstrap`]: service wiring for binaries
//! - [`api`]: HTTP routes and server startup
//! - [`error`]: centralized error types

#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod context;
pub mod error;
pub mod library;
pub mod services;
pub mod sonos;
pub mod state;

/// Service identifier reported by the health endpoint.
pub const SERVICE_NAME: &str = "roomcast";

// Re-export commonly used types at the crate root
pub use api::{start_server, AppState, ServerError};
pub use bootstrap::{bootstrap_services, BootstrappedServices};
pub use context::{IpDetector, LocalIpDetector, NetworkContext, NetworkError, UrlBuilder};
pub use error::{ErrorCode, RoomcastError, RoomcastResult};
pub use library::{LibraryError, MediaLibrary, PlaylistItem};
pub use services::{DiscoveryService, SpeakerController};
pub use sonos::discovery::{DiscoveryConfig, Speaker};
pub use state::{Config, SpeakerRegistry};
