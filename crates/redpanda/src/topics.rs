//! Topic names.

pub mod topic {
    /// Measurement events, one JSON payload per record.
    pub const METRICS: &str = "metrics-channel";

    /// All topics the pipeline expects to exist.
    pub const ALL: &[&str] = &[METRICS];
}
