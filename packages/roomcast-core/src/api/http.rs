//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the controller, the discovery
//! service, or the media library.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::api::response::{api_error, api_success};
use crate::api::AppState;
use crate::error::{ErrorCode, RoomcastError, RoomcastResult};
use crate::library::render_m3u;
use crate::SERVICE_NAME;

/// Path the root endpoint redirects to.
const CONTROLLER_DOCS_PATH: &str = "/ui/docs/controller";

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

/// Body accepted by every command endpoint.
#[derive(Debug, Default, Deserialize)]
struct SpeakerRequest {
    speaker: Option<String>,
}

/// Extracts the optional speaker name from a command body.
///
/// Absent, empty, or malformed bodies fall back to the default speaker, so
/// `curl -X POST .../sonos/pause` keeps working without a payload.
fn speaker_from_body(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice::<SpeakerRequest>(body) {
        Ok(request) => request.speaker,
        Err(e) => {
            log::debug!("[API] ignoring malformed command body: {}", e);
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let mut router = Router::new()
        .route("/", get(root_redirect))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/playlist", get(serve_playlist))
        .route("/echo", post(echo))
        .route("/api/sonos/discover", post(run_discovery))
        .route("/api/sonos/speakers", get(list_speakers))
        .route("/sonos/preset/{preset}", get(get_preset).post(play_preset))
        .route("/sonos/play", post(play_library))
        .route("/sonos/pause", post(pause))
        .route("/sonos/play-pause", post(play_pause))
        .route("/sonos/next", post(next_track))
        .route("/sonos/previous", post(previous_track))
        .route("/sonos/restart-playlist", post(restart_playlist))
        .route("/sonos/queue", post(queue_snapshot))
        .route("/sonos/volume-up", post(volume_up))
        .route("/sonos/volume-down", post(volume_down))
        .route("/sonos/mute", post(toggle_mute))
        .nest_service("/music", ServeDir::new(state.library.root()));

    if let Some(site_dir) = &state.site_dir {
        router = router.nest_service("/ui", ServeDir::new(site_dir));
    }

    router.layer(cors).with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn root_redirect() -> Redirect {
    Redirect::temporary(CONTROLLER_DOCS_PATH)
}

/// Liveness probe: "Is the process running?"
///
/// Always 200 while the server responds. Use `/ready` for readiness.
async fn health_check() -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_NAME,
    }))
}

/// Readiness probe: 503 until the initial discovery pass has completed.
async fn readiness_check(State(state): State<AppState>) -> Response {
    let ready = state.registry.is_ready();
    let status = if ready { "ready" } else { "discovering" };
    let body = json!({
        "status": status,
        "ready": ready,
        "speakers": state.registry.len(),
    });

    if ready {
        api_success(body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

/// Serves the whole library as an Extended M3U playlist.
async fn serve_playlist(State(state): State<AppState>) -> RoomcastResult<Response> {
    let items = state.library.full_playlist(&state.network.url_builder())?;
    if items.is_empty() {
        return Err(RoomcastError::NoTracks);
    }

    log::debug!("[API] generated playlist with {} song(s)", items.len());
    Ok((
        [
            (header::CONTENT_TYPE, "audio/x-mpegurl"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"playlist.m3u\"",
            ),
        ],
        render_m3u(&items),
    )
        .into_response())
}

/// Echoes the request body back (connectivity diagnostics).
async fn echo(body: Bytes) -> Bytes {
    body
}

/// Runs a discovery pass now and reports what it found.
async fn run_discovery(State(state): State<AppState>) -> Response {
    match state.discovery.run_once().await {
        Ok(found) => {
            let speakers: Vec<_> = found
                .iter()
                .map(|s| json!({ "name": s.name, "ip": s.address }))
                .collect();
            api_success(json!(speakers)).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.code(), e).into_response(),
    }
}

/// Lists the cached speaker registry.
async fn list_speakers(State(state): State<AppState>) -> impl IntoResponse {
    let speakers = state.registry.all();
    log::debug!("[API] returning {} cached speaker(s)", speakers.len());
    api_success(json!(speakers))
}

/// Returns a preset's playlist without touching any speaker.
async fn get_preset(
    Path(preset): Path<String>,
    State(state): State<AppState>,
) -> RoomcastResult<impl IntoResponse> {
    let items = state
        .library
        .preset_playlist(&preset, &state.network.url_builder())?;
    Ok(api_success(json!({
        "preset": preset,
        "playlist_count": items.len(),
        "playlist_items": items,
    })))
}

async fn play_preset(
    Path(preset): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state
        .controller
        .play_preset(speaker.as_deref(), &preset)
        .await?;
    Ok(api_success(json!(outcome)))
}

async fn play_library(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.play_library(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

async fn pause(State(state): State<AppState>, body: Bytes) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.pause(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

async fn play_pause(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.toggle_play_pause(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

async fn next_track(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.next_track(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

async fn previous_track(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.previous_track(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

async fn restart_playlist(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.restart_queue(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

async fn queue_snapshot(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let snapshot = state.controller.queue_snapshot(speaker.as_deref()).await?;
    Ok(api_success(json!(snapshot)))
}

async fn volume_up(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.volume_up(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

async fn volume_down(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.volume_down(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

async fn toggle_mute(
    State(state): State<AppState>,
    body: Bytes,
) -> RoomcastResult<impl IntoResponse> {
    let speaker = speaker_from_body(&body);
    let outcome = state.controller.toggle_mute(speaker.as_deref()).await?;
    Ok(api_success(json!(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_from_body_handles_all_shapes() {
        assert_eq!(speaker_from_body(b""), None);
        assert_eq!(speaker_from_body(b"not json"), None);
        assert_eq!(speaker_from_body(b"{}"), None);
        assert_eq!(
            speaker_from_body(br#"{"speaker":"Kitchen"}"#),
            Some("Kitchen".to_string())
        );
        assert_eq!(
            speaker_from_body(br#"{"speaker":"Kitchen","extra":1}"#),
            Some("Kitchen".to_string())
        );
    }

    #[test]
    fn redirect_targets_controller_docs() {
        assert_eq!(CONTROLLER_DOCS_PATH, "/ui/docs/controller");
    }
}
