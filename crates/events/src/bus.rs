//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the fan-out hub between the dispatcher and the
//! realtime layer. It is designed to be shared via `Arc<EventBus>`
//! across the application.

use tokio::sync::broadcast;
use veris_db::models::event::Event;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus carrying persisted events.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers can
/// independently receive every published [`Event`]. Delivery is
/// best-effort: there is no retry, no acknowledgement, and slow
/// receivers drop the oldest messages.
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no active subscribers the event is silently dropped; the
    /// durable copy already lives in the event store.
    pub fn publish(&self, event: Event) {
        // Ignore the SendError, it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn sample_event(event_type: &str) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            source: "consent-service".to_string(),
            title: None,
            description: None,
            priority: "normal".to_string(),
            severity: "minor".to_string(),
            domain: "general".to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            parent_event_id: None,
            event_time: now,
            data: serde_json::json!({}),
            entities: serde_json::json!([]),
            characteristics: serde_json::json!([]),
            delivery_status: "pending".to_string(),
            attempts: 0,
            max_attempts: 3,
            last_attempt: None,
            next_attempt: None,
            delivered_to: serde_json::json!([]),
            delivery_version: 0,
            dispatch_attempted: false,
            processing_error: None,
            expires_at: now + chrono::Duration::days(30),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(sample_event("ConsentRevoked"));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "ConsentRevoked");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = sample_event("PreferenceChanged");
        bus.publish(event.clone());

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.id, event.id);
        assert_eq!(e2.id, event.id);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers; this must not panic.
        bus.publish(sample_event("orphan"));
    }
}
