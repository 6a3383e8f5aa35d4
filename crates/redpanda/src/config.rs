//! Event bus configuration.

use serde::{Deserialize, Serialize};

use crate::topics::topic;

/// Which bus implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    Redpanda,
    Memory,
}

/// Bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_backend")]
    pub backend: BusBackend,
    /// Topic carrying measurement events
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub redpanda: RedpandaConfig,
    /// Per-topic buffer of the in-memory backend
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

fn default_backend() -> BusBackend {
    BusBackend::Redpanda
}

fn default_topic() -> String {
    topic::METRICS.to_string()
}

fn default_memory_capacity() -> usize {
    4096
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            topic: default_topic(),
            redpanda: RedpandaConfig::default(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

/// Redpanda connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    /// SASL/SCRAM-SHA-256 username; enables TLS when set with a password
    #[serde(default)]
    pub sasl_username: Option<String>,
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Upper bound on events returned by one fetch
    #[serde(default = "default_fetch_max_events")]
    pub fetch_max_events: usize,
    /// How long a fetch waits for new records
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_compression() -> String {
    "lz4".to_string()
}

fn default_fetch_max_events() -> usize {
    1000
}

fn default_fetch_timeout_ms() -> u64 {
    500
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            sasl_username: None,
            sasl_password: None,
            compression: default_compression(),
            fetch_max_events: default_fetch_max_events(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// SASL credentials, when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Fetch size in bytes, sized for `fetch_max_events` measurement records.
    pub fn fetch_max_bytes(&self) -> i32 {
        const RECORD_BYTES_UPPER: usize = 1024;
        (self.fetch_max_events.max(1) * RECORD_BYTES_UPPER).min(i32::MAX as usize) as i32
    }

    /// Broker-side fetch wait, clamped to the protocol's `i32` field.
    pub fn fetch_wait_ms(&self) -> i32 {
        self.fetch_timeout_ms.min(i32::MAX as u64) as i32
    }
}
