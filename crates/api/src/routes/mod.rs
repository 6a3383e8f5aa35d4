//! API routes.

pub mod aggregate;
pub mod health;
pub mod publish;
pub mod ws;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use pulse_core::limits::MAX_PUBLISH_BODY_BYTES;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route(
            "/publish",
            post(publish::publish_handler).layer(DefaultBodyLimit::max(MAX_PUBLISH_BODY_BYTES)),
        )
        .route("/aggregate", get(aggregate::aggregate_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/stats", get(health::stats_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
