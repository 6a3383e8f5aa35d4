//! ClickHouse table schemas.

use pulse_core::{Error, Result};
use tracing::debug;

use crate::client::ClickHouseClient;

/// Measurement table name.
pub const NETWORK_METRICS: &str = "network_metrics";

/// SQL for the measurement table.
///
/// One row per measurement; `ts` at millisecond precision so rows round-trip
/// the producer timestamp.
pub const CREATE_NETWORK_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS network_metrics (
    ts DateTime64(3, 'UTC'),
    location_id LowCardinality(String),
    network_load_percent Float64,
    avg_latency_ms Float64,
    packet_loss_ratio Float64,
    active_sessions UInt32
)
ENGINE = MergeTree()
PARTITION BY toYYYYMMDD(ts)
ORDER BY (location_id, ts)
TTL toDateTime(ts) + INTERVAL 30 DAY
"#;

/// Tables created on startup, in order.
pub fn all_tables() -> Vec<&'static str> {
    vec![CREATE_NETWORK_METRICS_TABLE]
}

/// Creates the database and all tables if they don't exist.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    let database = &client.config().database;
    client
        .server()
        .query(&format!("CREATE DATABASE IF NOT EXISTS {}", database))
        .execute()
        .await
        .map_err(|e| Error::internal(format!("Schema init error: {}", e)))?;

    for sql in all_tables() {
        client
            .inner()
            .query(sql)
            .execute()
            .await
            .map_err(|e| Error::internal(format!("Schema init error: {}", e)))?;
    }

    debug!(database = %database, "ClickHouse schema initialized");
    Ok(())
}
