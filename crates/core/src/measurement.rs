//! Measurement event: one network-quality sample for one location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::{Error, Result};

/// A single per-location network-quality measurement.
///
/// Produced upstream, carried once over the bus and consumed independently
/// by the ingest worker and the broadcast server. Flat by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MeasurementEvent {
    /// Producer wall-clock time of the sample, written as epoch milliseconds
    #[serde(
        serialize_with = "chrono::serde::ts_milliseconds::serialize",
        deserialize_with = "deserialize_timestamp"
    )]
    pub ts: DateTime<Utc>,
    /// Location key; many events share one location
    #[serde(alias = "market_id")]
    #[validate(length(min = 1, max = 128))]
    pub location_id: String,
    /// Network load (0-100)
    #[validate(range(min = 0.0, max = 100.0))]
    pub network_load_percent: f64,
    /// Average latency in milliseconds
    #[validate(range(min = 0.0))]
    pub avg_latency_ms: f64,
    /// Packet loss (0-100)
    #[validate(range(min = 0.0, max = 100.0))]
    pub packet_loss_ratio: f64,
    /// Active session count
    pub active_sessions: u32,
}

impl MeasurementEvent {
    /// Parses and validates a raw bus payload.
    ///
    /// Missing fields, wrong types and non-JSON input are `Error::Parse`;
    /// values outside the column ranges are `Error::Validation`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let event: Self = serde_json::from_slice(raw).map_err(|e| Error::parse(e.to_string()))?;
        event.check()?;
        Ok(event)
    }

    /// Same as [`parse`](Self::parse) for an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let event: Self = serde_json::from_value(value).map_err(|e| Error::parse(e.to_string()))?;
        event.check()?;
        Ok(event)
    }

    /// Runs field validation.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::validation(format!("{}: {}", self.location_id, e)))
    }

    /// Serializes the event into a bus payload.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Event time as milliseconds since the Unix epoch.
    pub fn ts_millis(&self) -> i64 {
        self.ts.timestamp_millis()
    }
}

/// Accepts RFC 3339 text (what JSON-encoded dates look like) or epoch
/// milliseconds, integer or fractional.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Millis(i64),
        Fractional(f64),
        Text(String),
    }

    let millis = match Repr::deserialize(deserializer)? {
        Repr::Millis(ms) => ms,
        Repr::Fractional(ms) if ms.is_finite() => ms.round() as i64,
        Repr::Fractional(ms) => {
            return Err(serde::de::Error::custom(format!("invalid timestamp {}", ms)))
        }
        Repr::Text(text) => {
            return DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {:?}: {}", text, e)))
        }
    };

    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp {} out of range", millis)))
}
