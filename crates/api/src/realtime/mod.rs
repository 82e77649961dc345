//! Realtime fan-out from the event bus to WebSocket listeners.

mod forwarder;

pub use forwarder::RealtimeForwarder;
