//! Event bus for the netpulse pipeline.
//!
//! Producers publish measurement payloads to a named topic; every
//! subscriber gets its own view of the topic and sees each payload once.
//! Two backends implement [`EventBus`]: [`RedpandaBus`] (Kafka protocol via
//! rskafka) and [`MemoryBus`] (in-process, for local runs and tests).

pub mod config;
pub mod connection;
pub mod consumer;
pub mod health;
pub mod memory;
pub mod producer;
pub mod subscriber;
pub mod topics;

use async_trait::async_trait;
use bytes::Bytes;
use pulse_core::Result;

pub use config::*;
pub use consumer::*;
pub use memory::*;
pub use producer::*;
pub use subscriber::*;
pub use topics::*;

/// Publish/subscribe transport carrying raw measurement payloads.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes one payload to `topic`.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Publishes several payloads, returning how many were accepted.
    async fn publish_many(&self, topic: &str, payloads: Vec<Bytes>) -> Result<usize> {
        let count = payloads.len();
        for payload in payloads {
            self.publish(topic, payload).await?;
        }
        Ok(count)
    }

    /// Opens an independent subscription positioned at the end of `topic`.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn Subscription>>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// One subscriber's cursor over a topic.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next payloads.
    ///
    /// `Ok(Some(vec![]))` means the wait timed out with nothing new.
    /// `Ok(None)` means the topic is closed and no more payloads will come.
    async fn next_batch(&mut self) -> Result<Option<Vec<Bytes>>>;
}

/// Receiver of payloads delivered by a subscription.
///
/// Called on the delivery path, so implementations must not block or wait
/// on I/O.
pub trait PayloadHandler: Send + Sync {
    fn on_event(&self, payload: &[u8]);
}
