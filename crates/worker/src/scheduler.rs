//! Runs the ingest worker: bus subscription plus the flush timer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pulse_core::Result;
use redpanda::{spawn_subscriber, EventBus, PayloadHandler};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::ingest::{FlushOutcome, IngestWorker};

/// Owns the background tasks that feed and flush an [`IngestWorker`].
pub struct WorkerScheduler {
    worker: IngestWorker,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerScheduler {
    pub fn new(worker: IngestWorker) -> Self {
        Self {
            worker,
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn worker(&self) -> &IngestWorker {
        &self.worker
    }

    /// Subscribes to `topic` and starts the subscriber and the flush timer.
    pub async fn start(&self, bus: &dyn EventBus, topic: &str) -> Result<()> {
        let subscription = bus.subscribe(topic).await?;
        let handler: Arc<dyn PayloadHandler> = Arc::new(self.worker.clone());

        let mut handles = self.handles.lock();
        handles.push(spawn_subscriber(
            "ingest",
            subscription,
            handler,
            self.cancel.child_token(),
        ));

        let worker = self.worker.clone();
        let cancel = self.cancel.child_token();
        handles.push(tokio::spawn(async move {
            run_flush_timer(worker, cancel).await;
        }));

        info!(
            topic = %topic,
            backend = bus.backend(),
            flush_size = self.worker.config().flush_size,
            flush_interval_ms = self.worker.config().flush_interval_ms,
            "Ingest worker started"
        );
        Ok(())
    }

    /// Stops the subscription and timer, then drains the worker.
    ///
    /// Everything, including the final flush, is bounded by `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> FlushOutcome {
        self.cancel.cancel();
        let deadline = tokio::time::Instant::now() + timeout;

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                error!("Ingest task did not stop before the shutdown deadline");
            }
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        self.worker.shutdown(remaining).await
    }
}

/// Periodic flush. Ticks never overlap: a slow write delays the next tick.
async fn run_flush_timer(worker: IngestWorker, cancel: CancellationToken) {
    let mut ticker = interval(worker.config().flush_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                worker.flush().await;
            }
        }
    }
}
