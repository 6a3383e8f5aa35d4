//! Bulk insert of measurements.

use std::time::Instant;

use clickhouse::Row;
use pulse_core::{Error, MeasurementEvent, Result};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::debug;

use crate::client::ClickHouseClient;
use crate::schema::NETWORK_METRICS;

/// One `network_metrics` row.
#[derive(Debug, Clone, PartialEq, Row, Serialize, Deserialize)]
pub struct MetricRow {
    pub ts: i64, // DateTime64(3) as milliseconds
    pub location_id: String,
    pub network_load_percent: f64,
    pub avg_latency_ms: f64,
    pub packet_loss_ratio: f64,
    pub active_sessions: u32,
}

impl From<MeasurementEvent> for MetricRow {
    fn from(event: MeasurementEvent) -> Self {
        Self {
            ts: event.ts_millis(),
            location_id: event.location_id,
            network_load_percent: event.network_load_percent,
            avg_latency_ms: event.avg_latency_ms,
            packet_loss_ratio: event.packet_loss_ratio,
            active_sessions: event.active_sessions,
        }
    }
}

/// Writes all measurements in a single INSERT statement.
pub async fn insert_measurements(
    client: &ClickHouseClient,
    events: Vec<MeasurementEvent>,
) -> Result<usize> {
    if events.is_empty() {
        return Ok(0);
    }

    let count = events.len();
    let start = Instant::now();

    let mut insert = client
        .inner()
        .insert(NETWORK_METRICS)
        .map_err(|e| Error::store_write(format!("Insert error: {}", e)))?;

    for row in events.into_iter().map(MetricRow::from) {
        insert
            .write(&row)
            .await
            .map_err(|e| Error::store_write(format!("Write error: {}", e)))?;
    }

    insert
        .end()
        .await
        .map_err(|e| Error::store_write(format!("End error: {}", e)))?;

    let elapsed = start.elapsed();
    metrics().insert_latency_ms.observe(elapsed.as_millis() as u64);

    debug!(
        count = count,
        latency_ms = %elapsed.as_millis(),
        "Inserted measurements"
    );

    Ok(count)
}
