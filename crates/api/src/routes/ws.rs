//! Observer WebSocket endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use broadcast::{BroadcastServer, ObserverTransport};
use futures_util::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use pulse_core::{Error, Result};
use tracing::{debug, warn};

use crate::state::AppState;

/// Write half of an upgraded socket.
pub struct WsTransport {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl ObserverTransport for WsTransport {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| Error::connection_write(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

/// GET /ws - Upgrades to an observer connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastServer>) {
    let (sink, mut stream) = socket.split();

    let id = match hub.connect(WsTransport { sink }).await {
        Ok(id) => id,
        Err(e) => {
            debug!(error = %e, "Observer dropped during handshake");
            return;
        }
    };

    // Observers only listen; anything but Close is ignored.
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(connection = %id, error = %e, "Observer socket error");
                break;
            }
        }
    }

    hub.disconnect(&id);
}
