//! Periodic rolling-aggregate push.

use std::sync::Arc;

use clickhouse_client::MetricStore;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::server::BroadcastServer;

/// Every `aggregate_interval`, queries the store and broadcasts the rows.
///
/// A failed query skips that tick only. Ticks never overlap: a slow query
/// pushes the next tick back.
pub async fn run_aggregate_pusher(
    server: Arc<BroadcastServer>,
    store: Arc<dyn MetricStore>,
    cancel: CancellationToken,
) {
    let mut ticker = interval(server.config().aggregate_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // Failures are logged and counted inside.
                let _ = server.push_aggregate_once(store.as_ref()).await;
            }
        }
    }

    info!("Aggregate pusher stopped");
}
