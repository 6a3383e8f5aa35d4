//! Size and range limits for measurement payloads.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so the field limits below are duplicated on `MeasurementEvent`. Keep both
//! in sync when modifying.

// === Publish Limits ===

/// Maximum publish request body size in bytes (1MB).
pub const MAX_PUBLISH_BODY_BYTES: usize = 1024 * 1024;

/// Maximum measurements accepted by a single publish request.
pub const MAX_PUBLISH_EVENTS: usize = 1000;

// === Field Limits ===

/// Location identifier max length (chars).
pub const MAX_LOCATION_ID_LEN: u64 = 128;

/// Upper bound for `network_load_percent`.
pub const MAX_NETWORK_LOAD_PERCENT: f64 = 100.0;

/// Upper bound for `packet_loss_ratio`.
///
/// Producers report loss on a 0-100 scale even though the column is named
/// a ratio; anything above 100 cannot be a real measurement.
pub const MAX_PACKET_LOSS: f64 = 100.0;

// === Aggregate Limits ===

/// Largest trailing window an on-demand aggregate may request (24 hours).
pub const MAX_AGGREGATE_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Largest row limit an on-demand aggregate may request.
pub const MAX_AGGREGATE_ROWS: u32 = 10_000;
