//! Read queries: the rolling aggregate and test helpers.

use std::time::Instant;

use clickhouse::Row;
use pulse_core::{AggregateQuery, AggregateRow, Error, Result};
use serde::Deserialize;
use telemetry::metrics;

use crate::client::ClickHouseClient;

/// Per-minute, per-location averages over a trailing window, newest first.
pub const ROLLING_AGGREGATE_SQL: &str = r#"
SELECT
    toUnixTimestamp64Milli(toDateTime64(toStartOfMinute(ts), 3)) AS bucket,
    location_id,
    avg(network_load_percent) AS network_load_avg,
    avg(avg_latency_ms) AS latency_avg,
    avg(packet_loss_ratio) AS packet_loss_avg,
    avg(active_sessions) AS active_sessions_avg,
    count() AS sample_count
FROM network_metrics
WHERE ts > now64(3) - toIntervalSecond(?)
GROUP BY bucket, location_id
ORDER BY bucket DESC, location_id
LIMIT ?
"#;

#[derive(Debug, Clone, Row, Deserialize)]
pub struct AggregateRecord {
    pub bucket: i64,
    pub location_id: String,
    pub network_load_avg: f64,
    pub latency_avg: f64,
    pub packet_loss_avg: f64,
    pub active_sessions_avg: f64,
    pub sample_count: u64,
}

impl From<AggregateRecord> for AggregateRow {
    fn from(r: AggregateRecord) -> Self {
        Self {
            bucket: r.bucket,
            location_id: r.location_id,
            network_load_avg: r.network_load_avg,
            latency_avg: r.latency_avg,
            packet_loss_avg: r.packet_loss_avg,
            active_sessions_avg: r.active_sessions_avg,
            sample_count: r.sample_count,
        }
    }
}

/// Runs the rolling aggregate.
pub async fn rolling_aggregate(
    client: &ClickHouseClient,
    query: &AggregateQuery,
) -> Result<Vec<AggregateRow>> {
    let start = Instant::now();
    let records: Vec<AggregateRecord> = client
        .inner()
        .query(ROLLING_AGGREGATE_SQL)
        .bind(query.window_secs())
        .bind(query.limit)
        .fetch_all()
        .await
        .map_err(|e| Error::store_query(format!("Query error: {}", e)))?;

    metrics()
        .aggregate_query_latency_ms
        .observe(start.elapsed().as_millis() as u64);

    Ok(records.into_iter().map(AggregateRow::from).collect())
}

/// Count stored measurements for a location (for testing).
pub async fn count_measurements(client: &ClickHouseClient, location_id: &str) -> Result<u64> {
    client
        .inner()
        .query("SELECT count() FROM network_metrics WHERE location_id = ?")
        .bind(location_id)
        .fetch_one()
        .await
        .map_err(|e| Error::store_query(format!("Query error: {}", e)))
}

/// Truncate the measurement table (test cleanup).
pub async fn truncate_measurements(client: &ClickHouseClient) -> Result<()> {
    client
        .inner()
        .query("TRUNCATE TABLE IF EXISTS network_metrics")
        .execute()
        .await
        .map_err(|e| Error::store_query(format!("Truncate error: {}", e)))
}
