//! Delivery loop from a [`Subscription`] to a [`PayloadHandler`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{PayloadHandler, Subscription};

/// Delay before fetching again after a bus error.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Feeds every payload from `subscription` to `handler` until cancelled or
/// the topic closes. Bus errors are logged and retried after a short delay.
pub async fn run_subscriber(
    name: &'static str,
    mut subscription: Box<dyn Subscription>,
    handler: Arc<dyn PayloadHandler>,
    cancel: CancellationToken,
) {
    info!(subscriber = name, "Subscriber started");

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = subscription.next_batch() => next,
        };

        match next {
            Ok(Some(payloads)) => {
                if !payloads.is_empty() {
                    debug!(subscriber = name, count = payloads.len(), "Delivering payloads");
                }
                for payload in &payloads {
                    handler.on_event(payload);
                }
            }
            Ok(None) => {
                info!(subscriber = name, "Topic closed");
                break;
            }
            Err(e) => {
                warn!(subscriber = name, error = %e, "Subscription error, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }

    info!(subscriber = name, "Subscriber stopped");
}

/// Spawns [`run_subscriber`] on the runtime.
pub fn spawn_subscriber(
    name: &'static str,
    subscription: Box<dyn Subscription>,
    handler: Arc<dyn PayloadHandler>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_subscriber(name, subscription, handler, cancel))
}
