//! Service layer.
//!
//! HTTP handlers stay thin; the business logic lives here.

pub mod controller;
pub mod discovery_service;

pub use controller::{
    MuteOutcome, PlaybackOutcome, QueueSnapshot, SpeakerController, VolumeOutcome,
};
pub use discovery_service::DiscoveryService;
