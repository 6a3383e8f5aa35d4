//! In-process metrics.
//!
//! Plain atomics behind a global registry; `/stats` serves a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down, never below zero).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

/// Latency histogram with fixed millisecond buckets.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper bound, count)` pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Process-wide pipeline metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Bus
    pub events_published: Counter,
    pub publish_errors: Counter,
    pub events_consumed: Counter,
    pub bus_fetch_errors: Counter,
    pub bus_lagged: Counter,

    // Ingest worker
    pub ingest_parse_errors: Counter,
    pub batches_flushed: Counter,
    pub events_inserted: Counter,
    pub store_write_errors: Counter,
    pub events_dropped: Counter,

    // Broadcast server
    pub broadcast_parse_errors: Counter,
    pub messages_broadcast: Counter,
    pub observer_evictions: Counter,
    pub aggregate_pushes: Counter,
    pub aggregate_query_errors: Counter,

    // Latency
    pub insert_latency_ms: Histogram,
    pub aggregate_query_latency_ms: Histogram,

    // Gauges
    pub buffer_depth: Gauge,
    pub pending_batches: Gauge,
    pub observers_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_published: u64,
    pub publish_errors: u64,
    pub events_consumed: u64,
    pub bus_fetch_errors: u64,
    pub bus_lagged: u64,
    pub ingest_parse_errors: u64,
    pub batches_flushed: u64,
    pub events_inserted: u64,
    pub store_write_errors: u64,
    pub events_dropped: u64,
    pub broadcast_parse_errors: u64,
    pub messages_broadcast: u64,
    pub observer_evictions: u64,
    pub aggregate_pushes: u64,
    pub aggregate_query_errors: u64,
    pub insert_latency_mean_ms: f64,
    pub aggregate_query_latency_mean_ms: f64,
    pub buffer_depth: u64,
    pub pending_batches: u64,
    pub observers_connected: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_published: self.events_published.get(),
            publish_errors: self.publish_errors.get(),
            events_consumed: self.events_consumed.get(),
            bus_fetch_errors: self.bus_fetch_errors.get(),
            bus_lagged: self.bus_lagged.get(),
            ingest_parse_errors: self.ingest_parse_errors.get(),
            batches_flushed: self.batches_flushed.get(),
            events_inserted: self.events_inserted.get(),
            store_write_errors: self.store_write_errors.get(),
            events_dropped: self.events_dropped.get(),
            broadcast_parse_errors: self.broadcast_parse_errors.get(),
            messages_broadcast: self.messages_broadcast.get(),
            observer_evictions: self.observer_evictions.get(),
            aggregate_pushes: self.aggregate_pushes.get(),
            aggregate_query_errors: self.aggregate_query_errors.get(),
            insert_latency_mean_ms: self.insert_latency_ms.mean(),
            aggregate_query_latency_mean_ms: self.aggregate_query_latency_ms.mean(),
            buffer_depth: self.buffer_depth.get(),
            pending_batches: self.pending_batches.get(),
            observers_connected: self.observers_connected.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
