//! Application state shared across handlers.

use std::sync::Arc;

use broadcast::BroadcastServer;
use clickhouse_client::MetricStore;
use redpanda::EventBus;
use worker::IngestWorker;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Event bus (Redpanda in production, in-memory in tests)
    pub bus: Arc<dyn EventBus>,
    /// Topic measurements are published to
    pub topic: String,
    /// Durable store used for on-demand aggregates
    pub store: Arc<dyn MetricStore>,
    /// Observer connections
    pub hub: Arc<BroadcastServer>,
    /// Ingest worker, when this process runs one
    pub ingest: Option<IngestWorker>,
}

impl AppState {
    pub fn new(
        bus: Arc<dyn EventBus>,
        topic: impl Into<String>,
        store: Arc<dyn MetricStore>,
        hub: Arc<BroadcastServer>,
    ) -> Self {
        Self {
            bus,
            topic: topic.into(),
            store,
            hub,
            ingest: None,
        }
    }

    pub fn with_ingest(mut self, worker: IngestWorker) -> Self {
        self.ingest = Some(worker);
        self
    }
}
