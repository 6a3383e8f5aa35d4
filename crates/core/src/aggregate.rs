//! Rolling aggregate rows and the query that produces them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::limits::{MAX_AGGREGATE_ROWS, MAX_AGGREGATE_WINDOW_SECS};

/// One row of the rolling per-minute aggregate.
///
/// Rows are ordered by `bucket` descending when returned from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Start of the one-minute bucket, epoch milliseconds
    pub bucket: i64,
    pub location_id: String,
    pub network_load_avg: f64,
    pub latency_avg: f64,
    pub packet_loss_avg: f64,
    pub active_sessions_avg: f64,
    pub sample_count: u64,
}

/// Trailing window and row cap for a rolling aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateQuery {
    pub window: Duration,
    pub limit: u32,
}

impl AggregateQuery {
    /// Periodic push: last 5 minutes, 20 rows.
    pub const PUSH_DEFAULT: Self = Self {
        window: Duration::from_secs(300),
        limit: 20,
    };

    /// On-demand HTTP read: last 10 minutes, 60 rows.
    pub const ON_DEMAND_DEFAULT: Self = Self {
        window: Duration::from_secs(600),
        limit: 60,
    };

    pub fn new(window: Duration, limit: u32) -> Self {
        Self { window, limit }
    }

    /// Builds a query from caller-supplied values, rejecting zero or
    /// oversized windows and limits.
    pub fn bounded(window_secs: u64, limit: u32) -> Result<Self> {
        if window_secs == 0 || window_secs > MAX_AGGREGATE_WINDOW_SECS {
            return Err(Error::validation(format!(
                "window_secs must be between 1 and {}",
                MAX_AGGREGATE_WINDOW_SECS
            )));
        }
        if limit == 0 || limit > MAX_AGGREGATE_ROWS {
            return Err(Error::validation(format!(
                "limit must be between 1 and {}",
                MAX_AGGREGATE_ROWS
            )));
        }
        Ok(Self::new(Duration::from_secs(window_secs), limit))
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}
