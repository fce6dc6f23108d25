//! HTTP and WebSocket surface for the natural-language-to-database agent.

mod auth;
mod error;
mod middleware;
mod routes;
mod state;
pub mod ws;

pub mod config;
pub mod shutdown;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::routes::{feedback_handler, query_handler, status_handler};
pub use crate::state::AppState;

/// Wires the full router: the three REST endpoints, the WebSocket upgrade,
/// and the ambient middleware stack (tracing span per request, permissive
/// CORS, a blanket request timeout).
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
    .route("/api/query", post(query_handler))
    .route("/api/feedback", post(feedback_handler))
    .route("/api/status", get(status_handler))
    .route("/ws", get(ws::ws_handler))
    .layer(TimeoutLayer::new(request_timeout))
    .layer(middleware::cors_layer())
    .layer(middleware::trace_layer())
    .with_state(state)
}
