//! On-demand rolling aggregate.

use axum::{
    extract::{Query, State},
    Json,
};
use pulse_core::{AggregateQuery, AggregateRow};
use serde::Deserialize;
use tracing::error;

use crate::response::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AggregateParams {
    pub window_secs: Option<u64>,
    pub limit: Option<u32>,
}

/// GET /aggregate - Per-minute, per-location averages over a trailing window.
///
/// Defaults to the last 10 minutes, newest 60 rows.
pub async fn aggregate_handler(
    State(state): State<AppState>,
    Query(params): Query<AggregateParams>,
) -> Result<Json<Vec<AggregateRow>>, ApiError> {
    let defaults = AggregateQuery::ON_DEMAND_DEFAULT;
    let query = AggregateQuery::bounded(
        params.window_secs.unwrap_or(defaults.window_secs()),
        params.limit.unwrap_or(defaults.limit),
    )?;

    let rows = state.store.rolling_aggregate(&query).await.map_err(|e| {
        error!(code = e.error_code(), error = %e, "On-demand aggregate failed");
        ApiError::from(e)
    })?;

    Ok(Json(rows))
}
