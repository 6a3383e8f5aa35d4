//! Messages pushed to observers over the live channel.

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRow;
use crate::measurement::MeasurementEvent;

/// Outbound observer message, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObserverMessage {
    /// First message on every connection
    Welcome { ts: i64 },
    /// One live measurement, re-encoded with `ts` in epoch milliseconds
    Metric { metric: MeasurementEvent },
    /// Periodic rolling aggregate
    Aggregate { rows: Vec<AggregateRow> },
}

impl ObserverMessage {
    /// Welcome stamped with the current server time.
    pub fn welcome_now() -> Self {
        Self::Welcome {
            ts: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Serializes to the text frame sent to observers.
    pub fn to_frame(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
