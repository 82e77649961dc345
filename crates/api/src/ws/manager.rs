use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use veris_core::classification::filter_matches;
use veris_core::types::Timestamp;
use veris_db::models::event::Event;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// Optional event type filter. `None` means the connection receives
    /// every event; `Some(t)` restricts it to events of type `t`.
    pub filter: Option<String>,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            filter: None,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Set (or clear) the event type filter for a connection.
    ///
    /// Unknown connection IDs are ignored.
    pub async fn set_filter(&self, conn_id: &str, filter: Option<String>) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.filter = filter;
        }
    }

    /// Send a message to a single connection.
    ///
    /// Returns `false` if the connection does not exist or its channel
    /// is closed.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        let conns = self.connections.read().await;
        match conns.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Broadcast an event to every connection whose filter matches its
    /// event type. Best effort; returns the number of connections the
    /// event was sent to.
    ///
    /// Connections whose send channels are closed are pruned from the map
    /// so a dead listener does not accumulate forever.
    pub async fn broadcast_event(&self, event: &Event) -> usize {
        let payload = serde_json::json!({
            "type": "event",
            "data": event,
        });
        let text = match serde_json::to_string(&payload) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Failed to serialize event for broadcast");
                return 0;
            }
        };
        let message = Message::Text(text.into());

        let mut sent = 0;
        let mut stale: Vec<String> = Vec::new();
        {
            let conns = self.connections.read().await;
            for (id, conn) in conns.iter() {
                if !filter_matches(conn.filter.as_deref(), &event.event_type) {
                    continue;
                }
                if conn.sender.send(message.clone()).is_ok() {
                    sent += 1;
                } else {
                    stale.push(id.clone());
                }
            }
        }

        if !stale.is_empty() {
            let mut conns = self.connections.write().await;
            for id in &stale {
                conns.remove(id);
            }
            tracing::debug!(pruned = stale.len(), "Pruned closed WebSocket connections");
        }

        sent
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
