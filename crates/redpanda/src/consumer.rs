//! Redpanda subscription.
//!
//! Each subscription owns its partition client and an in-memory offset
//! that starts at the latest offset when first connected; payloads that
//! arrived before the subscriber started are never replayed.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use pulse_core::{Error, Result};
use rskafka::client::partition::{OffsetAt, PartitionClient};
use telemetry::metrics;
use tracing::{debug, info, warn};

use crate::config::RedpandaConfig;
use crate::connection;
use crate::Subscription;

/// A subscription to one topic, partition 0.
pub struct RedpandaSubscription {
    config: RedpandaConfig,
    topic: String,
    /// Cached partition client; dropped on fetch errors to force a reconnect
    client: Option<Arc<PartitionClient>>,
    /// Next offset to read, `None` until first connected
    next_offset: Option<i64>,
}

impl RedpandaSubscription {
    pub fn new(config: RedpandaConfig, topic: impl Into<String>) -> Self {
        Self {
            config,
            topic: topic.into(),
            client: None,
            next_offset: None,
        }
    }

    /// Connects eagerly so subscription errors surface at startup.
    pub async fn connect(mut self) -> Result<Self> {
        self.ensure_connected().await?;
        Ok(self)
    }

    async fn ensure_connected(&mut self) -> Result<Arc<PartitionClient>> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let client = connection::partition_client(&self.config, &self.topic).await?;

        if self.next_offset.is_none() {
            let offset = client
                .get_offset(OffsetAt::Latest)
                .await
                .map_err(|e| Error::bus(format!("failed to get offset: {}", e)))?;
            self.next_offset = Some(offset);

            info!(
                topic = %self.topic,
                partition = 0,
                offset = offset,
                "Subscription initialized at latest offset"
            );
        }

        self.client = Some(client.clone());
        Ok(client)
    }

    /// Next offset this subscription will read.
    pub fn next_offset(&self) -> Option<i64> {
        self.next_offset
    }

    /// Drops the cached connection (for error recovery).
    pub fn reset_connection(&mut self) {
        if self.client.take().is_some() {
            info!(topic = %self.topic, "Subscription connection reset");
        }
    }
}

#[async_trait]
impl Subscription for RedpandaSubscription {
    async fn next_batch(&mut self) -> Result<Option<Vec<Bytes>>> {
        let client = self.ensure_connected().await?;
        let current = self.next_offset.unwrap_or(0);
        let start = Instant::now();

        let fetched = client
            .fetch_records(
                current,
                1..self.config.fetch_max_bytes(),
                self.config.fetch_wait_ms(),
            )
            .await;

        let (records, _watermark) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(topic = %self.topic, offset = current, error = %e, "Fetch failed");
                metrics().bus_fetch_errors.inc();
                self.reset_connection();
                return Err(Error::bus(format!("failed to fetch records: {}", e)));
            }
        };

        let mut payloads = Vec::with_capacity(records.len());
        let mut max_offset = current - 1;

        for record in records {
            if record.offset < current {
                continue;
            }
            max_offset = max_offset.max(record.offset);
            if let Some(value) = record.record.value {
                payloads.push(Bytes::from(value));
            }
        }

        if max_offset >= current {
            self.next_offset = Some(max_offset + 1);
        }

        if !payloads.is_empty() {
            metrics().events_consumed.inc_by(payloads.len() as u64);
            debug!(
                topic = %self.topic,
                events = payloads.len(),
                offset_start = current,
                offset_end = max_offset,
                latency_ms = %start.elapsed().as_millis(),
                "Fetched records"
            );
        }

        Ok(Some(payloads))
    }
}
