//! Route Configuration
//!
//! Configures the gateway endpoint, the chat-domain HTTP surface, and the
//! operational endpoints.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket gateway endpoint; authentication happens at the handshake
        .route("/gateway", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes (all bearer-authenticated)
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/rooms", post(handlers::room::create_room))
        .route("/rooms/dm", post(handlers::room::create_dm))
        .route(
            "/rooms/{room_id}/messages",
            get(handlers::message::get_messages),
        )
        .route("/rooms/{room_id}/read", post(handlers::message::mark_read))
        .route(
            "/messages/{message_id}",
            patch(handlers::message::update_message),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
