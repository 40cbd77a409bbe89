//! Axum handlers for the speech endpoints.
//!
//! Handlers are thin wrappers: each calls one `SpeechService` method and
//! returns the result as JSON.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use spoke_voice::{RuntimeSnapshot, StateUpdate, StopReport, SubmitReport, VoiceInfo};

use crate::error::HttpError;
use crate::state::AppState;

// ── Request / response shapes ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub applied: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ready: bool,
}

// ── Handlers ───────────────────────────────────────────────────────

/// `POST /speak`
pub async fn speak(
    State(state): State<AppState>,
    Json(req): Json<SpeakRequest>,
) -> Json<SubmitReport> {
    Json(state.submit(&req.text))
}

/// `GET /state`
pub async fn get_state(State(state): State<AppState>) -> Json<RuntimeSnapshot> {
    Json(state.state())
}

/// `PATCH /state`
///
/// Selecting the alternate engine may load it, so the update runs on the
/// blocking pool.
pub async fn update_state(
    State(state): State<AppState>,
    Json(update): Json<StateUpdate>,
) -> Result<Json<UpdateResponse>, HttpError> {
    let service = Arc::clone(&state);
    let applied = tokio::task::spawn_blocking(move || service.update_state(update)).await??;
    Ok(Json(UpdateResponse { applied }))
}

/// `POST /stop`
pub async fn stop(State(state): State<AppState>) -> Json<StopReport> {
    Json(state.stop())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthResponse { ready }))
}

/// `GET /voices`
pub async fn voices(State(state): State<AppState>) -> Json<Vec<VoiceInfo>> {
    Json(state.voices().to_vec())
}
