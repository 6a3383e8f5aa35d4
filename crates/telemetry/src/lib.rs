//! Telemetry for the netpulse pipeline.
//!
//! Process-wide counters and gauges, a component health registry, and the
//! `tracing` subscriber setup shared by the binary and the tests.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
