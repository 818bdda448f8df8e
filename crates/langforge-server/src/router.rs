//! Router assembly for the langforge HTTP API.
//!
//! [`build_router`] wires the handlers to their routes with CORS and
//! tracing middleware layers.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// CORS is permissive (the browser frontend may be served from anywhere).
/// TraceLayer provides request-level logging via tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(handlers::generate::submit))
        .route("/generate/status", get(handlers::generate::status))
        .route("/generate/terminate", post(handlers::generate::terminate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
