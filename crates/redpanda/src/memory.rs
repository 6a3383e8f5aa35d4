//! In-process [`EventBus`] over `tokio::sync::broadcast`.
//!
//! Each topic is one broadcast channel; each subscription is one receiver.
//! A subscriber that falls more than `capacity` payloads behind loses the
//! oldest ones (counted as `bus_lagged`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use pulse_core::{Error, Result};
use telemetry::metrics;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use crate::{EventBus, Subscription};

/// Most payloads handed out by one `next_batch` call.
const MAX_BATCH: usize = 512;

pub struct MemoryBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<Bytes>>>,
    closed: AtomicBool,
}

impl MemoryBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Bytes> {
        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Closes every topic. Subscriptions drain what is buffered, then end;
    /// later publishes fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.topics.lock().clear();
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::bus("memory bus is closed"));
        }
        Ok(())
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.ensure_open()?;
        // No receivers is not an error: nobody is listening yet.
        let _ = self.sender(topic).send(payload);
        metrics().events_published.inc();
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>> {
        self.ensure_open()?;
        Ok(Box::new(MemorySubscription {
            topic: topic.to_string(),
            rx: self.sender(topic).subscribe(),
        }))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

pub struct MemorySubscription {
    topic: String,
    rx: broadcast::Receiver<Bytes>,
}

impl MemorySubscription {
    fn record_lag(&self, skipped: u64) {
        warn!(topic = %self.topic, skipped = skipped, "Subscriber lagged, payloads skipped");
        metrics().bus_lagged.inc_by(skipped);
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn next_batch(&mut self) -> Result<Option<Vec<Bytes>>> {
        let first = loop {
            match self.rx.recv().await {
                Ok(payload) => break payload,
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return Ok(None),
            }
        };

        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match self.rx.try_recv() {
                Ok(payload) => batch.push(payload),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(_) => break,
            }
        }

        metrics().events_consumed.inc_by(batch.len() as u64);
        Ok(Some(batch))
    }
}
