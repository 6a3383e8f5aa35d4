//! Health check and stats endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::{health, metrics};

use crate::response::{HealthResponse, StatsResponse};
use crate::state::AppState;

/// GET /health - Full health check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = health().report();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        bus_connected: health().bus.is_healthy(),
        store_connected: health().store.is_healthy(),
        buffer_depth: metrics().buffer_depth.get(),
        observers: state.hub.connection_count(),
        components: report.components,
    })
}

/// GET /health/ready - Readiness probe (can accept traffic).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /stats - Process counters plus the local ingest worker, if any.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        metrics: metrics().snapshot(),
        ingest: state.ingest.as_ref().map(|w| w.stats()),
        observers: state.hub.connection_count(),
    })
}
