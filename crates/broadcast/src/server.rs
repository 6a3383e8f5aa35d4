//! Broadcast server: observer lifecycle and fan-out entry points.

use std::sync::Arc;
use std::time::Duration;

use clickhouse_client::MetricStore;
use pulse_core::{Error, MeasurementEvent, ObserverMessage, Result};
use redpanda::{spawn_subscriber, EventBus, PayloadHandler};
use telemetry::metrics;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregate::run_aggregate_pusher;
use crate::config::BroadcastConfig;
use crate::registry::{
    ConnectionId, ConnectionRegistry, ConnectionState, FanOutReport, Frame, ObserverHandle,
    StateCell,
};
use crate::transport::ObserverTransport;

pub struct BroadcastServer {
    config: BroadcastConfig,
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastServer {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Greets a new observer and registers it.
    ///
    /// The welcome frame goes out directly on the transport before the
    /// connection is registered, so it is always the first frame an observer
    /// sees. A failed or timed-out welcome leaves nothing registered.
    pub async fn connect<T: ObserverTransport>(&self, mut transport: T) -> Result<ConnectionId> {
        let id = ConnectionId::new();
        let state = Arc::new(StateCell::new(ConnectionState::Connecting));
        let welcome = ObserverMessage::welcome_now().to_frame()?;

        let greeted =
            match tokio::time::timeout(self.config.write_timeout(), transport.send_text(&welcome))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::connection_write("welcome write timed out")),
            };

        if let Err(e) = greeted {
            state.close();
            transport.close().await;
            warn!(connection = %id, error = %e, "Observer handshake failed");
            return Err(e);
        }

        state.open();
        let (handle, rx) = ObserverHandle::new(id, self.config.outbound_queue, state.clone());
        self.registry.insert(handle);

        tokio::spawn(writer_loop(
            id,
            transport,
            rx,
            state,
            self.registry.clone(),
            self.config.write_timeout(),
        ));

        info!(connection = %id, observers = self.registry.len(), "Observer connected");
        Ok(id)
    }

    /// Removes an observer. Calling it again, or with an unknown id, is harmless.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            info!(connection = %id, observers = self.registry.len(), "Observer disconnected");
        }
        removed
    }

    /// Serializes `message` once and queues it for every observer.
    pub fn broadcast(&self, message: &ObserverMessage) -> Result<FanOutReport> {
        let frame: Frame = Arc::from(message.to_frame()?);
        let report = self.registry.fan_out(frame);
        metrics().messages_broadcast.inc();
        Ok(report)
    }

    /// Queries the store once and pushes the result to every observer.
    pub async fn push_aggregate_once(&self, store: &dyn MetricStore) -> Result<FanOutReport> {
        let query = self.config.aggregate_query();
        match store.rolling_aggregate(&query).await {
            Ok(rows) => {
                let count = rows.len();
                let report = self.broadcast(&ObserverMessage::Aggregate { rows })?;
                metrics().aggregate_pushes.inc();
                debug!(rows = count, delivered = report.delivered, "Pushed aggregate");
                Ok(report)
            }
            Err(e) => {
                error!(code = e.error_code(), error = %e, "Aggregate query failed, skipping push");
                metrics().aggregate_query_errors.inc();
                Err(e)
            }
        }
    }

    /// Subscribes to `topic` and starts forwarding plus the aggregate pusher.
    pub async fn start(
        self: &Arc<Self>,
        bus: &dyn EventBus,
        topic: &str,
        store: Arc<dyn MetricStore>,
        cancel: CancellationToken,
    ) -> Result<Vec<JoinHandle<()>>> {
        let subscription = bus.subscribe(topic).await?;
        let handler: Arc<dyn PayloadHandler> = self.clone();

        let handles = vec![
            spawn_subscriber("broadcast", subscription, handler, cancel.child_token()),
            tokio::spawn(run_aggregate_pusher(
                self.clone(),
                store,
                cancel.child_token(),
            )),
        ];

        info!(
            topic = %topic,
            backend = bus.backend(),
            aggregate_interval_ms = self.config.aggregate_interval_ms,
            "Broadcast server started"
        );
        Ok(handles)
    }

    /// Drops every observer; their writers close the transports.
    pub fn close_all(&self) -> usize {
        let closed = self.registry.close_all();
        if closed > 0 {
            info!(observers = closed, "Closed all observer connections");
        }
        closed
    }
}

impl PayloadHandler for BroadcastServer {
    fn on_event(&self, payload: &[u8]) {
        let metric = match MeasurementEvent::parse(payload) {
            Ok(metric) => metric,
            Err(e) => {
                debug!(code = e.error_code(), error = %e, "Dropping malformed measurement");
                metrics().broadcast_parse_errors.inc();
                return;
            }
        };

        if let Err(e) = self.broadcast(&ObserverMessage::Metric { metric }) {
            error!(error = %e, "Failed to broadcast measurement");
        }
    }
}

/// Drains one observer's queue onto its transport.
///
/// Ends when the handle leaves the registry (queue closed) or a write fails;
/// either way the connection ends Closed, unregistered, and closed.
async fn writer_loop<T: ObserverTransport>(
    id: ConnectionId,
    mut transport: T,
    mut rx: mpsc::Receiver<Frame>,
    state: Arc<StateCell>,
    registry: Arc<ConnectionRegistry>,
    write_timeout: Duration,
) {
    while let Some(frame) = rx.recv().await {
        if state.is_closed() {
            break;
        }
        match tokio::time::timeout(write_timeout, transport.send_text(&frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(connection = %id, error = %e, "Observer write failed, evicting");
                metrics().observer_evictions.inc();
                break;
            }
            Err(_) => {
                warn!(
                    connection = %id,
                    timeout_ms = %write_timeout.as_millis(),
                    "Observer write timed out, evicting"
                );
                metrics().observer_evictions.inc();
                break;
            }
        }
    }

    state.close();
    registry.remove(&id);
    transport.close().await;
    debug!(connection = %id, "Observer writer stopped");
}
