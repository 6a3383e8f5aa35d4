//! Ingest worker configuration.

use std::time::Duration;

use pulse_core::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Buffered events that trigger an immediate flush
    #[serde(default = "default_flush_size")]
    pub flush_size: usize,
    /// Period of the flush timer
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Size-triggered batches allowed to wait on the store at once
    #[serde(default = "default_max_pending_batches")]
    pub max_pending_batches: usize,
    /// Extra insert attempts per batch; 0 drops a batch on first failure
    #[serde(default)]
    pub max_retries: u32,
    /// Base delay between attempts, multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_flush_size() -> usize {
    200
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_max_pending_batches() -> usize {
    4
}

fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            flush_size: default_flush_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_pending_batches: default_max_pending_batches(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl IngestConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Rejects zero sizes and intervals.
    pub fn validate(&self) -> Result<()> {
        if self.flush_size == 0 {
            return Err(Error::config("ingest.flush_size must be greater than 0"));
        }
        if self.flush_interval_ms == 0 {
            return Err(Error::config("ingest.flush_interval_ms must be greater than 0"));
        }
        if self.max_pending_batches == 0 {
            return Err(Error::config("ingest.max_pending_batches must be greater than 0"));
        }
        Ok(())
    }
}
