//! The write side of an observer connection.

use async_trait::async_trait;
use pulse_core::Result;

/// Something text frames can be written to: a WebSocket sink in production,
/// a recording channel in tests.
#[async_trait]
pub trait ObserverTransport: Send + 'static {
    /// Writes one text frame. An error means the connection is unusable.
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Closes the connection. Best effort.
    async fn close(&mut self);
}
