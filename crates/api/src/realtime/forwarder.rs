//! Bus-to-WebSocket forwarding loop.
//!
//! [`RealtimeForwarder`] subscribes to the event bus and pushes each
//! event to connected WebSocket clients whose filter matches. Delivery
//! is best effort: a lagging or disconnected listener never blocks
//! ingestion or callback delivery.

use std::sync::Arc;

use tokio::sync::broadcast;
use veris_db::models::event::Event;

use crate::ws::WsManager;

/// Forwards bus events to WebSocket listeners.
pub struct RealtimeForwarder {
    ws_manager: Arc<WsManager>,
}

impl RealtimeForwarder {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the forwarding loop.
    ///
    /// Subscribes to the event bus via `receiver` and pushes each event
    /// to matching connections. The loop exits when the channel is
    /// closed (i.e. the [`EventBus`](veris_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<Event>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let sent = self.ws_manager.broadcast_event(&event).await;
                    tracing::debug!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        sent,
                        "Broadcast event to realtime listeners"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Realtime forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, realtime forwarder shutting down");
                    break;
                }
            }
        }
    }
}
