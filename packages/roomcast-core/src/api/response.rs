//! JSON response helpers for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Wraps a JSON value in a 200 response.
pub fn api_success(value: Value) -> Json<Value> {
    Json(value)
}

/// The minimal success acknowledgement.
pub fn api_ok() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Builds an error response with a machine-readable code.
pub fn api_error(
    status: StatusCode,
    code: &'static str,
    err: impl std::fmt::Display,
) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": err.to_string(),
            "status": status.as_u16(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_carries_code_and_status() {
        let response = api_error(StatusCode::NOT_FOUND, "speaker_not_found", "no such speaker");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
