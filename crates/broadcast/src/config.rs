//! Broadcast server configuration.

use std::time::Duration;

use pulse_core::{AggregateQuery, Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Period of the aggregate push
    #[serde(default = "default_aggregate_interval_ms")]
    pub aggregate_interval_ms: u64,
    /// Trailing window of the pushed aggregate
    #[serde(default = "default_aggregate_window_secs")]
    pub aggregate_window_secs: u64,
    /// Row cap of the pushed aggregate
    #[serde(default = "default_aggregate_limit")]
    pub aggregate_limit: u32,
    /// Frames queued per observer before it is considered stuck
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Bound on a single frame write to an observer
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_aggregate_interval_ms() -> u64 {
    5000
}

fn default_aggregate_window_secs() -> u64 {
    300
}

fn default_aggregate_limit() -> u32 {
    20
}

fn default_outbound_queue() -> usize {
    256
}

fn default_write_timeout_ms() -> u64 {
    5000
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            aggregate_interval_ms: default_aggregate_interval_ms(),
            aggregate_window_secs: default_aggregate_window_secs(),
            aggregate_limit: default_aggregate_limit(),
            outbound_queue: default_outbound_queue(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl BroadcastConfig {
    pub fn aggregate_interval(&self) -> Duration {
        Duration::from_millis(self.aggregate_interval_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn aggregate_query(&self) -> AggregateQuery {
        AggregateQuery::new(
            Duration::from_secs(self.aggregate_window_secs),
            self.aggregate_limit,
        )
    }

    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("aggregate_interval_ms", self.aggregate_interval_ms == 0),
            ("aggregate_window_secs", self.aggregate_window_secs == 0),
            ("aggregate_limit", self.aggregate_limit == 0),
            ("outbound_queue", self.outbound_queue == 0),
            ("write_timeout_ms", self.write_timeout_ms == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(Error::config(format!(
                "broadcast.{} must be greater than 0",
                field
            ))),
            None => Ok(()),
        }
    }
}
