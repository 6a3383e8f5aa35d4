//! Test fixtures and measurement generators.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use pulse_core::MeasurementEvent;

/// A valid measurement for `location` at `ts`.
pub fn measurement_at(location: &str, ts: DateTime<Utc>) -> MeasurementEvent {
    MeasurementEvent {
        ts,
        location_id: location.to_string(),
        network_load_percent: 40.0,
        avg_latency_ms: 55.0,
        packet_loss_ratio: 0.2,
        active_sessions: 1200,
    }
}

/// A valid measurement for `location`, timestamped now.
pub fn measurement(location: &str) -> MeasurementEvent {
    measurement_at(location, Utc::now())
}

/// `n` measurements for one location, one millisecond apart.
pub fn measurements(location: &str, n: usize) -> Vec<MeasurementEvent> {
    let base = Utc::now();
    (0..n)
        .map(|i| measurement_at(location, base + Duration::milliseconds(i as i64)))
        .collect()
}

/// Bus payload for a measurement.
pub fn payload(event: &MeasurementEvent) -> Bytes {
    Bytes::from(event.to_payload().unwrap())
}

/// JSON body for a measurement, with `ts` as epoch milliseconds.
pub fn measurement_json(location: &str) -> serde_json::Value {
    serde_json::json!({
        "ts": Utc::now().timestamp_millis(),
        "location_id": location,
        "network_load_percent": 40,
        "avg_latency_ms": 55,
        "packet_loss_ratio": 0.2,
        "active_sessions": 1200
    })
}

/// A measurement that parses but fails range validation.
pub fn out_of_range_json() -> serde_json::Value {
    let mut value = measurement_json("A");
    value["network_load_percent"] = serde_json::json!(250);
    value
}

/// A payload missing required fields.
pub fn incomplete_payload() -> Bytes {
    Bytes::from_static(br#"{"location_id":"A"}"#)
}

/// A payload that is not JSON at all.
pub fn garbage_payload() -> Bytes {
    Bytes::from_static(b"\x00not-json")
}
