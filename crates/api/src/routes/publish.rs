//! Measurement publish endpoint.
//!
//! Accepts a single measurement, an array, or `{"metrics": [...]}`.
//! Each item is validated on its own and valid ones go onto the bus.

use axum::{body::Bytes, extract::State, Json};
use pulse_core::{MeasurementEvent, PublishPayload};
use tracing::{debug, error, warn};

use crate::response::{ApiError, PublishResponse};
use crate::state::AppState;

/// POST /publish
pub async fn publish_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PublishResponse>, ApiError> {
    let payload = PublishPayload::parse(&body).map_err(|e| {
        debug!(error = %e, "Rejected publish body");
        ApiError::from(e)
    })?;

    let total = payload.len();
    let mut accepted = Vec::with_capacity(total);
    let mut errors = Vec::new();

    for (index, item) in payload.items.into_iter().enumerate() {
        match MeasurementEvent::from_value(item).and_then(|event| event.to_payload()) {
            Ok(encoded) => accepted.push(Bytes::from(encoded)),
            Err(e) => errors.push(format!("item {}: {}", index, e)),
        }
    }

    if !errors.is_empty() {
        warn!(
            accepted = accepted.len(),
            rejected = errors.len(),
            "Some measurements failed validation"
        );
    }

    let received = if accepted.is_empty() {
        0
    } else {
        state
            .bus
            .publish_many(&state.topic, accepted)
            .await
            .map_err(|e| {
                error!(code = e.error_code(), error = %e, "Failed to publish measurements");
                ApiError::from(e)
            })?
    };

    debug!(total = total, received = received, "Publish handled");
    Ok(Json(PublishResponse::partial(received, errors)))
}
