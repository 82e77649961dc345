//! Subscription entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use veris_core::classification::filter_matches;
use veris_core::types::Timestamp;

/// A row from the `subscriptions` table: a standing request for HTTP
/// callback delivery of matching future events.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    /// Event-type filter; `None` matches every event.
    pub event_type: Option<String>,
    /// Callback URL events are POSTed to.
    pub callback: String,
    /// Opaque consumer-side filter expression, stored verbatim.
    pub query: Option<String>,
    /// Identity of the subscriber, when supplied by the auth layer.
    pub owner: Option<String>,
    pub created_at: Timestamp,
}

impl Subscription {
    /// Whether this subscription wants events of the given type.
    pub fn matches(&self, event_type: &str) -> bool {
        filter_matches(self.event_type.as_deref(), event_type)
    }
}

/// Payload for `POST /events/subscribe`.
#[derive(Debug, Deserialize)]
pub struct CreateSubscription {
    pub event_type: Option<String>,
    pub callback: String,
    pub query: Option<String>,
    pub owner: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sub(event_type: Option<&str>) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            event_type: event_type.map(str::to_string),
            callback: "http://consumer.test/hook".to_string(),
            query: None,
            owner: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn typed_subscription_matches_exact_type() {
        let s = sub(Some("ConsentRevoked"));
        assert!(s.matches("ConsentRevoked"));
        assert!(!s.matches("ConsentGranted"));
    }

    #[test]
    fn untyped_subscription_matches_all() {
        let s = sub(None);
        assert!(s.matches("ConsentRevoked"));
        assert!(s.matches("DsarOpened"));
    }
}
