use std::sync::Arc;

use veris_events::{Dispatcher, EventBus};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: veris_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (realtime listeners).
    pub ws_manager: Arc<WsManager>,
    /// Broadcast bus carrying ingested events to realtime consumers.
    pub event_bus: Arc<EventBus>,
    /// Dispatch engine for callback delivery passes.
    pub dispatcher: Arc<Dispatcher>,
}
