//! Centralized error types for the Roomcast core library.
//!
//! Defines the application-wide error enum, maps module errors into it, and
//! implements `IntoResponse` so handlers can bubble errors with `?` and get
//! consistent JSON error bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::library::LibraryError;
use crate::sonos::discovery::DiscoveryError;
use crate::sonos::soap::SoapError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SocketBind(_) => "socket_bind_failed",
            Self::NoInterfaces => "no_network_interfaces",
            Self::AllMethodsDisabled => "discovery_disabled",
        }
    }
}

impl ErrorCode for SoapError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http_request_failed",
            Self::HttpStatus(_, _) => "http_error_status",
            Self::Fault(_) => "soap_fault",
            Self::Parse => "soap_parse_error",
        }
    }
}

/// Application-wide error type for the Roomcast server.
#[derive(Debug, Error)]
pub enum RoomcastError {
    /// Speaker discovery failed (SSDP/network issues).
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// SOAP request to a speaker failed.
    #[error("SOAP request failed: {0}")]
    Soap(String),

    /// No cached speaker matches the requested name.
    #[error("speaker '{0}' not found")]
    SpeakerNotFound(String),

    /// The requested preset does not exist.
    #[error("preset '{0}' not found")]
    PresetNotFound(String),

    /// A playback command found nothing to queue.
    #[error("no songs available")]
    NoTracks,

    /// Client sent an invalid or malformed request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RoomcastError {
    /// Returns a machine-readable error code for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery_failed",
            Self::Soap(_) => "soap_error",
            Self::SpeakerNotFound(_) => "speaker_not_found",
            Self::PresetNotFound(_) => "preset_not_found",
            Self::NoTracks => "no_tracks",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SpeakerNotFound(_) | Self::PresetNotFound(_) | Self::NoTracks => {
                StatusCode::NOT_FOUND
            }
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type RoomcastResult<T> = Result<T, RoomcastError>;

// Re-export Result type aliases from their defining modules
pub use crate::library::LibraryResult;
pub use crate::sonos::discovery::DiscoveryResult;
pub use crate::sonos::soap::SoapResult;

/// JSON body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for RoomcastError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<SoapError> for RoomcastError {
    fn from(err: SoapError) -> Self {
        Self::Soap(err.to_string())
    }
}

impl From<DiscoveryError> for RoomcastError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err.to_string())
    }
}

impl From<LibraryError> for RoomcastError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::PresetNotFound(p) => Self::PresetNotFound(p),
            LibraryError::InvalidPreset(p) => {
                Self::InvalidRequest(format!("invalid preset identifier: {}", p))
            }
            LibraryError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_errors_map_to_404() {
        for err in [
            RoomcastError::SpeakerNotFound("Den".into()),
            RoomcastError::PresetNotFound("9".into()),
            RoomcastError::NoTracks,
        ] {
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn invalid_request_maps_to_400() {
        let err = RoomcastError::InvalidRequest("nope".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn soap_errors_map_to_500() {
        let err: RoomcastError = SoapError::Parse.into();
        assert_eq!(err.code(), "soap_error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn library_errors_convert_with_matching_codes() {
        let err: RoomcastError = LibraryError::PresetNotFound("5".into()).into();
        assert_eq!(err.code(), "preset_not_found");

        let err: RoomcastError = LibraryError::InvalidPreset("../x".into()).into();
        assert_eq!(err.code(), "invalid_request");
    }
}
