//! The batching ingest worker.
//!
//! Two paths lead to a store write:
//! 1. Size trigger: the append that fills the buffer drains it and hands the
//!    batch to a spawned write, bounded by `max_pending_batches`.
//! 2. Time trigger: the flush timer calls [`IngestWorker::flush`].
//!
//! Both go through the same write gate, so at most one insert is in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clickhouse_client::MetricStore;
use pulse_core::{Error, MeasurementEvent, Result};
use redpanda::PayloadHandler;
use serde::Serialize;
use telemetry::{metrics, Counter};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::buffer::BatchBuffer;
use crate::config::IngestConfig;

/// What a flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered
    Empty,
    /// Rows written
    Written(usize),
    /// Events lost: rejected by the store, over the pending cap, or cut off by shutdown
    Dropped(usize),
}

/// Per-worker counters.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub parse_errors: Counter,
    pub batches_flushed: Counter,
    pub events_inserted: Counter,
    pub events_dropped: Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub parse_errors: u64,
    pub batches_flushed: u64,
    pub events_inserted: u64,
    pub events_dropped: u64,
    pub buffered: usize,
}

struct Inner {
    config: IngestConfig,
    store: Arc<dyn MetricStore>,
    buffer: BatchBuffer,
    write_gate: Mutex<()>,
    pending: Arc<Semaphore>,
    /// Events taken out of the buffer whose write has not finished
    in_flight: AtomicUsize,
    stats: IngestStats,
}

/// Batching ingest worker. Cheap to clone; clones share one buffer.
#[derive(Clone)]
pub struct IngestWorker {
    inner: Arc<Inner>,
}

impl IngestWorker {
    pub fn new(config: IngestConfig, store: Arc<dyn MetricStore>) -> Self {
        let inner = Inner {
            buffer: BatchBuffer::new(config.flush_size),
            pending: Arc::new(Semaphore::new(config.max_pending_batches.max(1))),
            write_gate: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
            stats: IngestStats::default(),
            store,
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    /// Number of events waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.inner.buffer.len()
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        let stats = &self.inner.stats;
        IngestStatsSnapshot {
            parse_errors: stats.parse_errors.get(),
            batches_flushed: stats.batches_flushed.get(),
            events_inserted: stats.events_inserted.get(),
            events_dropped: stats.events_dropped.get(),
            buffered: self.buffered(),
        }
    }

    /// Appends a validated event; a full buffer is handed to a background write.
    ///
    /// Must be called from within a tokio runtime.
    pub fn append(&self, event: MeasurementEvent) {
        let drained = self.inner.buffer.push(event);
        metrics().buffer_depth.set(self.inner.buffer.len() as u64);
        if let Some(batch) = drained {
            self.dispatch(batch);
        }
    }

    fn dispatch(&self, batch: Vec<MeasurementEvent>) {
        let permit = match self.inner.pending.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    count = batch.len(),
                    max_pending = self.inner.config.max_pending_batches,
                    "Too many batches waiting on the store, dropping batch"
                );
                self.record_dropped(batch.len());
                return;
            }
        };

        metrics().pending_batches.inc();
        self.inner.in_flight.fetch_add(batch.len(), Ordering::SeqCst);
        let worker = self.clone();
        tokio::spawn(async move {
            worker.write_batch(batch).await;
            metrics().pending_batches.dec();
            drop(permit);
        });
    }

    /// Writes whatever is buffered as one batch.
    pub async fn flush(&self) -> FlushOutcome {
        let batch = self.inner.buffer.take();
        metrics().buffer_depth.set(self.inner.buffer.len() as u64);
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }
        self.inner.in_flight.fetch_add(batch.len(), Ordering::SeqCst);
        self.write_batch(batch).await
    }

    async fn write_batch(&self, batch: Vec<MeasurementEvent>) -> FlushOutcome {
        let _gate = self.inner.write_gate.lock().await;
        let count = batch.len();
        let result = self.insert_with_retry(batch).await;
        self.inner.in_flight.fetch_sub(count, Ordering::SeqCst);

        match result {
            Ok(written) => {
                self.inner.stats.batches_flushed.inc();
                self.inner.stats.events_inserted.inc_by(written as u64);
                metrics().batches_flushed.inc();
                metrics().events_inserted.inc_by(written as u64);
                debug!(count = written, "Flushed batch");
                FlushOutcome::Written(written)
            }
            Err(e) => {
                error!(
                    count = count,
                    code = e.error_code(),
                    error = %e,
                    "Failed to write batch, dropping it"
                );
                metrics().store_write_errors.inc();
                self.record_dropped(count);
                FlushOutcome::Dropped(count)
            }
        }
    }

    /// Inserts with linear backoff. Only the last attempt consumes the batch.
    async fn insert_with_retry(&self, mut events: Vec<MeasurementEvent>) -> Result<usize> {
        let max_retries = self.inner.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = self.inner.config.retry_backoff() * attempt;
                warn!(
                    attempt = attempt,
                    backoff_ms = %backoff.as_millis(),
                    "Retrying store insert"
                );
                tokio::time::sleep(backoff).await;
            }

            let attempt_events = if attempt < max_retries {
                events.clone()
            } else {
                std::mem::take(&mut events)
            };

            match self.inner.store.insert_batch(attempt_events).await {
                Ok(count) => return Ok(count),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::store_write("insert failed with unknown error")))
    }

    fn record_dropped(&self, count: usize) {
        self.inner.stats.events_dropped.inc_by(count as u64);
        metrics().events_dropped.inc_by(count as u64);
    }

    /// Waits for background writes, then flushes what is left, all within `timeout`.
    ///
    /// On timeout every event not yet written is reported as dropped: the
    /// batches still waiting on the store and whatever remains buffered.
    /// Call after the subscription has stopped delivering.
    pub async fn shutdown(&self, timeout: Duration) -> FlushOutcome {
        let drain = async {
            let permits = self.inner.config.max_pending_batches.max(1) as u32;
            // Holding every permit means no background write is left.
            let _all = self.inner.pending.acquire_many(permits).await;
            self.flush().await
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(outcome) => {
                info!(outcome = ?outcome, "Ingest worker drained");
                outcome
            }
            Err(_) => {
                let in_flight = self.inner.in_flight.load(Ordering::SeqCst);
                let buffered = self.inner.buffer.take().len();
                metrics().buffer_depth.set(0);
                let abandoned = in_flight + buffered;
                error!(
                    in_flight = in_flight,
                    buffered = buffered,
                    timeout_ms = %timeout.as_millis(),
                    "Ingest worker shutdown timed out, abandoning unwritten events"
                );
                self.record_dropped(abandoned);
                FlushOutcome::Dropped(abandoned)
            }
        }
    }
}

impl PayloadHandler for IngestWorker {
    fn on_event(&self, payload: &[u8]) {
        match MeasurementEvent::parse(payload) {
            Ok(event) => self.append(event),
            Err(e) => {
                debug!(code = e.error_code(), error = %e, "Dropping malformed measurement");
                self.inner.stats.parse_errors.inc();
                metrics().ingest_parse_errors.inc();
            }
        }
    }
}
