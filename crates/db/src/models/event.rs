//! Event entity models and DTOs.
//!
//! An [`Event`] row is immutable once created except for its delivery
//! sub-record (`delivery_status`, `attempts`, `last_attempt`,
//! `next_attempt`, `delivered_to`, `delivery_version`) and the dispatch
//! bookkeeping fields (`dispatch_attempted`, `processing_error`). Every
//! delivery-state write is a compare-and-swap on `delivery_version`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use veris_core::classification::{
    validate_priority, validate_required, validate_severity, DEFAULT_DOMAIN, DEFAULT_PRIORITY,
    DEFAULT_SEVERITY,
};
use veris_core::delivery::DEFAULT_MAX_ATTEMPTS;
use veris_core::error::CoreError;
use veris_core::types::Timestamp;

/// A resource touched by an event (`events.entities` JSONB element).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// A name/value/type triple (`events.characteristics` JSONB element).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCharacteristic {
    pub name: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

/// One callback delivery attempt (`events.delivered_to` JSONB element).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Callback URL the event was posted to.
    pub endpoint: String,
    /// `success` or `failed` (see `veris_core::delivery`).
    pub outcome: String,
    pub response_code: Option<u16>,
    pub timestamp: Timestamp,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A full row from the `events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: String,
    pub source: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: String,
    pub severity: String,
    pub domain: String,
    pub correlation_id: String,
    pub parent_event_id: Option<Uuid>,
    pub event_time: Timestamp,
    pub data: serde_json::Value,
    pub entities: serde_json::Value,
    pub characteristics: serde_json::Value,
    pub delivery_status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_attempt: Option<Timestamp>,
    pub next_attempt: Option<Timestamp>,
    pub delivered_to: serde_json::Value,
    pub delivery_version: i64,
    pub dispatch_attempted: bool,
    pub processing_error: Option<String>,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

/// Lightweight view of an event for list responses.
///
/// Omits the free-form `data` payload, which can be large; everything
/// else matches [`Event`].
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub event_type: String,
    pub source: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: String,
    pub severity: String,
    pub domain: String,
    pub correlation_id: String,
    pub parent_event_id: Option<Uuid>,
    pub event_time: Timestamp,
    pub entities: serde_json::Value,
    pub characteristics: serde_json::Value,
    pub delivery_status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_attempt: Option<Timestamp>,
    pub next_attempt: Option<Timestamp>,
    pub dispatch_attempted: bool,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Ingestion payload for `POST /events`.
#[derive(Debug, Deserialize)]
pub struct CreateEvent {
    pub event_type: String,
    pub source: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
    pub domain: Option<String>,
    pub correlation_id: Option<String>,
    pub parent_event_id: Option<Uuid>,
    pub event_time: Option<Timestamp>,
    pub data: Option<serde_json::Value>,
    pub entities: Option<Vec<EntityRef>>,
    pub characteristics: Option<Vec<EventCharacteristic>>,
    pub max_attempts: Option<i32>,
}

/// A fully resolved event ready for insertion.
///
/// Produced by [`NewEvent::from_create`], which validates the payload and
/// fills every default the ingestion contract promises.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub id: Uuid,
    pub event_type: String,
    pub source: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: String,
    pub severity: String,
    pub domain: String,
    pub correlation_id: String,
    pub parent_event_id: Option<Uuid>,
    pub event_time: Timestamp,
    pub data: serde_json::Value,
    pub entities: serde_json::Value,
    pub characteristics: serde_json::Value,
    pub max_attempts: i32,
    pub expires_at: Timestamp,
}

impl NewEvent {
    /// Validate an ingestion payload and resolve defaults.
    ///
    /// - `event_type` and `source` are required and size-checked.
    /// - `priority` defaults to `normal`, `severity` to `minor`, `domain`
    ///   to `general`; explicit values must be from the known sets.
    /// - `correlation_id` is auto-generated when absent.
    /// - `event_time` defaults to now; a value at or past the retention
    ///   deadline is rejected so `expires_at > event_time` always holds.
    /// - `expires_at` is creation time plus `retention_days`.
    ///
    /// Parent/child acyclicity is NOT checked here; callers supplying
    /// `parent_event_id` own that invariant.
    pub fn from_create(input: CreateEvent, retention_days: i64) -> Result<Self, CoreError> {
        validate_required(&input.event_type, &input.source)?;

        let priority = match input.priority {
            Some(p) => {
                validate_priority(&p)?;
                p
            }
            None => DEFAULT_PRIORITY.to_string(),
        };
        let severity = match input.severity {
            Some(s) => {
                validate_severity(&s)?;
                s
            }
            None => DEFAULT_SEVERITY.to_string(),
        };

        let max_attempts = input.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts < 1 {
            return Err(CoreError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let now = Utc::now();
        let event_time = input.event_time.unwrap_or(now);
        let expires_at = now + chrono::Duration::days(retention_days.max(1));
        if event_time >= expires_at {
            return Err(CoreError::Validation(format!(
                "event_time must fall before the retention deadline ({retention_days} days)"
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            event_type: input.event_type,
            source: input.source,
            title: input.title,
            description: input.description,
            priority,
            severity,
            domain: input.domain.unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            correlation_id: input
                .correlation_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            parent_event_id: input.parent_event_id,
            event_time,
            data: input.data.unwrap_or_else(|| serde_json::json!({})),
            entities: serde_json::to_value(input.entities.unwrap_or_default())
                .unwrap_or_else(|_| serde_json::json!([])),
            characteristics: serde_json::to_value(input.characteristics.unwrap_or_default())
                .unwrap_or_else(|_| serde_json::json!([])),
            max_attempts,
            expires_at,
        })
    }
}

/// Optional filters for event listings.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub source: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub priority: Option<String>,
    pub severity: Option<String>,
    pub processed: Option<bool>,
    pub correlation_id: Option<String>,
    pub from_date: Option<Timestamp>,
    pub to_date: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn valid_input() -> CreateEvent {
        CreateEvent {
            event_type: "ConsentRevoked".to_string(),
            source: "consent-service".to_string(),
            title: None,
            description: None,
            priority: None,
            severity: None,
            domain: None,
            correlation_id: None,
            parent_event_id: None,
            event_time: None,
            data: None,
            entities: None,
            characteristics: None,
            max_attempts: None,
        }
    }

    #[test]
    fn defaults_are_filled() {
        let ev = NewEvent::from_create(valid_input(), 30).unwrap();
        assert_eq!(ev.priority, "normal");
        assert_eq!(ev.severity, "minor");
        assert_eq!(ev.domain, "general");
        assert_eq!(ev.max_attempts, 3);
        assert!(!ev.correlation_id.is_empty());
        assert!(ev.data.is_object());
        assert!(ev.entities.is_array());
    }

    #[test]
    fn ids_are_unique_across_events() {
        let a = NewEvent::from_create(valid_input(), 30).unwrap();
        let b = NewEvent::from_create(valid_input(), 30).unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[test]
    fn expires_at_is_after_event_time() {
        let ev = NewEvent::from_create(valid_input(), 30).unwrap();
        assert!(ev.expires_at > ev.event_time);

        let mut backdated = valid_input();
        backdated.event_time = Some(Utc::now() - chrono::Duration::days(365));
        let ev = NewEvent::from_create(backdated, 30).unwrap();
        assert!(ev.expires_at > ev.event_time);
    }

    #[test]
    fn event_time_past_retention_deadline_rejected() {
        let mut input = valid_input();
        input.event_time = Some(Utc::now() + chrono::Duration::days(31));
        assert_matches!(
            NewEvent::from_create(input, 30),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn explicit_correlation_id_is_kept() {
        let mut input = valid_input();
        input.correlation_id = Some("chain-7".to_string());
        let ev = NewEvent::from_create(input, 30).unwrap();
        assert_eq!(ev.correlation_id, "chain-7");
    }

    #[test]
    fn missing_event_type_rejected() {
        let mut input = valid_input();
        input.event_type = String::new();
        assert_matches!(
            NewEvent::from_create(input, 30),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn unknown_priority_rejected() {
        let mut input = valid_input();
        input.priority = Some("extreme".to_string());
        assert!(NewEvent::from_create(input, 30).is_err());
    }

    #[test]
    fn zero_max_attempts_rejected() {
        let mut input = valid_input();
        input.max_attempts = Some(0);
        assert!(NewEvent::from_create(input, 30).is_err());
    }
}
