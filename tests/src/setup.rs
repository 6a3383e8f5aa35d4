//! Common test setup functions.

use api::{router, state::AppState};
use axum::Router;
use broadcast::{BroadcastConfig, BroadcastServer};
use clickhouse_client::MetricStore;
use parking_lot::Mutex;
use pulse_core::MeasurementEvent;
use redpanda::{topic, EventBus, MemoryBus};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use worker::{FlushOutcome, IngestConfig, IngestWorker, WorkerScheduler};

use crate::fixtures;
use crate::mocks::MockStore;

/// The whole pipeline wired over an in-memory bus and a mock store.
///
/// Runs the same code as the binary:
/// - the ingest worker and broadcast server each hold their own subscription
/// - the real Axum router serves HTTP and WebSocket traffic
pub struct TestContext {
    pub bus: Arc<MemoryBus>,
    pub store: MockStore,
    pub worker: IngestWorker,
    pub scheduler: WorkerScheduler,
    pub hub: Arc<BroadcastServer>,
    pub router: Router,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(IngestConfig::default(), BroadcastConfig::default()).await
    }

    pub async fn with_config(ingest: IngestConfig, broadcast: BroadcastConfig) -> Self {
        let bus = Arc::new(MemoryBus::new(4096));
        let store = MockStore::new();
        let shared: Arc<dyn MetricStore> = Arc::new(store.clone());
        let cancel = CancellationToken::new();

        let worker = IngestWorker::new(ingest, shared.clone());
        let scheduler = WorkerScheduler::new(worker.clone());
        scheduler
            .start(bus.as_ref(), topic::METRICS)
            .await
            .expect("Failed to start ingest worker");

        let hub = Arc::new(BroadcastServer::new(broadcast));
        let handles = hub
            .start(bus.as_ref(), topic::METRICS, shared.clone(), cancel.clone())
            .await
            .expect("Failed to start broadcast server");

        let state = AppState::new(
            bus.clone() as Arc<dyn EventBus>,
            topic::METRICS,
            shared,
            hub.clone(),
        )
        .with_ingest(worker.clone());

        Self {
            bus,
            store,
            worker,
            scheduler,
            hub,
            router: router(state),
            cancel,
            handles: Mutex::new(handles),
        }
    }

    /// Publishes one measurement onto the bus.
    pub async fn publish(&self, event: &MeasurementEvent) {
        self.bus
            .publish(topic::METRICS, fixtures::payload(event))
            .await
            .expect("Failed to publish");
    }

    /// Publishes a raw payload onto the bus.
    pub async fn publish_raw(&self, payload: bytes::Bytes) {
        self.bus
            .publish(topic::METRICS, payload)
            .await
            .expect("Failed to publish");
    }

    /// Serves the router on an ephemeral local port.
    pub async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local address");
        let app = self.router.clone();
        let cancel = self.cancel.clone();
        self.handles.lock().push(tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await;
        }));
        addr
    }

    /// Stops every background task and drains the worker.
    pub async fn shutdown(&self, timeout: Duration) -> FlushOutcome {
        self.cancel.cancel();
        let outcome = self.scheduler.shutdown(timeout).await;
        self.hub.close_all();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = tokio::time::timeout(timeout, handle).await;
        }
        outcome
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
