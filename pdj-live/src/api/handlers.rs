//! HTTP request handlers
//!
//! Transport and recording commands never fail at the HTTP level: their
//! outcome arrives as notifications on the event stream. `play` and `toggle`
//! are started in the background because connecting may take arbitrarily
//! long.

use crate::api::AppContext;
use crate::session::{ControllerStatus, DispatchOutcome};
use axum::{extract::State, http::StatusCode, Json};
use pdj_common::{Prompt, PromptSet};
use serde::Serialize;
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

impl StatusResponse {
    fn new(status: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: status.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PromptUpdateResponse {
    status: String,
    /// None if the update was cancelled before dispatch
    outcome: Option<DispatchOutcome>,
}

// ============================================================================
// Health / Status
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "pdj-live".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/v1/status
pub async fn status(State(ctx): State<AppContext>) -> Json<ControllerStatus> {
    Json(ctx.controller.status().await)
}

// ============================================================================
// Transport
// ============================================================================

/// POST /api/v1/playback/toggle
pub async fn toggle(State(ctx): State<AppContext>) -> (StatusCode, Json<StatusResponse>) {
    info!("Play/pause toggle requested");
    let controller = ctx.controller.clone();
    tokio::spawn(async move { controller.play_pause().await });
    (StatusCode::ACCEPTED, StatusResponse::new("accepted"))
}

/// POST /api/v1/playback/play
pub async fn play(State(ctx): State<AppContext>) -> (StatusCode, Json<StatusResponse>) {
    info!("Play requested");
    let controller = ctx.controller.clone();
    tokio::spawn(async move { controller.play().await });
    (StatusCode::ACCEPTED, StatusResponse::new("accepted"))
}

/// POST /api/v1/playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.controller.pause().await;
    StatusResponse::new(ctx.controller.playback_state().await.to_string())
}

/// POST /api/v1/playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.controller.stop().await;
    StatusResponse::new(ctx.controller.playback_state().await.to_string())
}

// ============================================================================
// Prompts
// ============================================================================

/// GET /api/v1/prompts
pub async fn get_prompts(State(ctx): State<AppContext>) -> Json<PromptSet> {
    Json(ctx.controller.prompts().await)
}

/// PUT /api/v1/prompts - replace the prompt set
///
/// Waits for the rate-limited dispatch that carries this update.
pub async fn set_prompts(
    State(ctx): State<AppContext>,
    Json(prompts): Json<Vec<Prompt>>,
) -> Result<Json<PromptUpdateResponse>, (StatusCode, Json<StatusResponse>)> {
    let set = PromptSet::from_prompts(prompts).map_err(|e| {
        warn!("Rejected prompt update: {}", e);
        (StatusCode::BAD_REQUEST, StatusResponse::new(format!("error: {}", e)))
    })?;

    let outcome = ctx.controller.set_weighted_prompts(set).await.ok();
    Ok(Json(PromptUpdateResponse {
        status: "ok".to_string(),
        outcome,
    }))
}

// ============================================================================
// Recording
// ============================================================================

/// POST /api/v1/recording/toggle
pub async fn toggle_recording(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.controller.toggle_recording().await;
    let recording = ctx.controller.is_recording().await;
    StatusResponse::new(if recording { "recording" } else { "idle" })
}
