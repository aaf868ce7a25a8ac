//! Sonos speaker control and discovery.
//!
//! Implements the minimal UPnP plumbing this application needs: SSDP
//! discovery of ZonePlayer devices and SOAP commands against the
//! AVTransport, RenderingControl, ContentDirectory, and DeviceProperties
//! services.
//!
//! # Module Structure
//!
//! - `services` - UPnP service definitions (URNs, control paths)
//! - `soap` - low-level SOAP transport and request builder
//! - `didl` - DIDL-Lite metadata formatting and parsing
//! - `transport` - play, pause, skip, seek, and transport state
//! - `queue` - queue rebuild and Content Directory browsing
//! - `volume` - volume and mute control
//! - `device` - device properties (zone name)
//! - `discovery` - SSDP discovery and metadata resolution
//! - `utils` - URL building and XML helpers

pub mod device;
pub mod didl;
pub mod discovery;
pub mod queue;
pub mod services;
pub mod soap;
pub mod transport;
pub mod utils;
pub mod volume;

pub use didl::QueueItem;
pub use discovery::{DiscoveryConfig, DiscoveryError, DiscoveryResult, Speaker};
pub use services::SonosService;
pub use soap::{SoapError, SoapResult};
pub use transport::{TransportInfo, TransportState};
