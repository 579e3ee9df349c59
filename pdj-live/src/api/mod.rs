//! HTTP control surface
//!
//! REST endpoints mapping to the controller's inbound commands, plus an SSE
//! stream of `LiveEvent` notifications.

pub mod handlers;
pub mod sse;

use crate::error::{Error, Result};
use crate::session::LiveMusicController;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub controller: LiveMusicController,
    pub port: u16,
}

/// Build the router (also used directly by tests)
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                .route("/status", get(handlers::status))
                // Transport
                .route("/playback/toggle", post(handlers::toggle))
                .route("/playback/play", post(handlers::play))
                .route("/playback/pause", post(handlers::pause))
                .route("/playback/stop", post(handlers::stop))
                // Prompts
                .route("/prompts", get(handlers::get_prompts).put(handlers::set_prompts))
                // Recording
                .route("/recording/toggle", post(handlers::toggle_recording))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run(ctx: AppContext, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
