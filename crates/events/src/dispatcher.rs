//! Per-event dispatch passes.
//!
//! A full pass delivers the event to every matching callback
//! subscription, publishes it on the [`EventBus`] for realtime
//! consumers, and marks the event as dispatch-attempted. The retry-only
//! path (used by the sweeper's second scan) delivers without
//! re-publishing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use veris_core::delivery::{apply_pass, is_terminal, PassOutcome, OUTCOME_FAILED, OUTCOME_SUCCESS};
use veris_core::types::Timestamp;
use veris_db::models::event::{DeliveryRecord, Event};
use veris_db::models::subscription::Subscription;
use veris_db::repositories::{EventRepo, SubscriptionRepo};
use veris_db::DbPool;

use crate::bus::EventBus;
use crate::delivery::webhook::{DeliveryError, WebhookDelivery};

/// Upper bound on concurrent callback calls within one pass.
const MAX_CONCURRENT_DELIVERIES: usize = 8;

/// Aggregate wall-time budget for one pass across all subscriptions.
const DISPATCH_DEADLINE: Duration = Duration::from_secs(30);

/// Runs dispatch passes: callback fan-out plus realtime publication.
///
/// Cheap to share via `Arc`; holds the connection pool, the webhook
/// transport, and the bus handle.
pub struct Dispatcher {
    pool: DbPool,
    webhook: WebhookDelivery,
    bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self {
            pool,
            webhook: WebhookDelivery::new(),
            bus,
        }
    }

    /// Run a full dispatch pass: delivery, broadcast, then mark the
    /// event dispatch-attempted regardless of the delivery outcome.
    pub async fn run_pass(&self, event: &Event) -> Result<(), sqlx::Error> {
        self.deliver(event).await?;
        self.bus.publish(event.clone());
        EventRepo::mark_dispatch_attempted(&self.pool, event.id).await?;
        Ok(())
    }

    /// Attempt callback delivery for one event (no rebroadcast).
    ///
    /// Terminal events and events with zero matching subscriptions are
    /// left untouched. Otherwise exactly one attempt per matching
    /// subscription is made and the aggregate outcome is written back
    /// through the version-checked [`EventRepo::record_pass`].
    pub async fn deliver(&self, event: &Event) -> Result<(), sqlx::Error> {
        if is_terminal(&event.delivery_status) {
            return Ok(());
        }

        let subscriptions = SubscriptionRepo::list_matching(&self.pool, &event.event_type).await?;
        if subscriptions.is_empty() {
            tracing::debug!(event_id = %event.id, "No matching subscriptions, nothing to deliver");
            return Ok(());
        }

        let payload = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Failed to serialize event payload");
                return Ok(());
            }
        };

        let webhook = &self.webhook;
        let payload_ref = &payload;
        let calls = subscriptions.into_iter().map(|sub| async move {
            let result = webhook.deliver(&sub.callback, payload_ref).await;
            (sub, result)
        });
        let fan_out = stream::iter(calls)
            .buffer_unordered(MAX_CONCURRENT_DELIVERIES)
            .collect::<Vec<_>>();

        let (records, outcome) = match tokio::time::timeout(DISPATCH_DEADLINE, fan_out).await {
            Ok(results) => summarize_pass(results, Utc::now()),
            Err(_) => {
                tracing::error!(
                    event_id = %event.id,
                    deadline_secs = DISPATCH_DEADLINE.as_secs(),
                    "Dispatch pass exceeded its aggregate deadline"
                );
                let record = DeliveryRecord {
                    endpoint: "*".to_string(),
                    outcome: OUTCOME_FAILED.to_string(),
                    response_code: None,
                    timestamp: Utc::now(),
                    error: Some("dispatch deadline exceeded".to_string()),
                };
                (vec![record], PassOutcome::Failed)
            }
        };

        let transition = apply_pass(event.attempts, event.max_attempts, outcome, Utc::now());
        let records_json = serde_json::to_value(&records).unwrap_or_else(|_| serde_json::json!([]));

        let updated = EventRepo::record_pass(
            &self.pool,
            event.id,
            event.delivery_version,
            transition.status,
            transition.attempts,
            transition.last_attempt,
            transition.next_attempt,
            &records_json,
        )
        .await?;

        if !updated {
            tracing::warn!(
                event_id = %event.id,
                expected_version = event.delivery_version,
                "Concurrent dispatch pass already recorded an outcome, dropping this one"
            );
            return Ok(());
        }

        match outcome {
            PassOutcome::Delivered => {
                tracing::info!(
                    event_id = %event.id,
                    callbacks = records.len(),
                    "Event delivered to all matching subscriptions"
                );
            }
            PassOutcome::Failed => {
                tracing::warn!(
                    event_id = %event.id,
                    status = transition.status,
                    attempts = transition.attempts,
                    next_attempt = ?transition.next_attempt,
                    "Delivery pass failed"
                );
            }
        }

        Ok(())
    }
}

/// Fold per-subscription call results into the pass record log and its
/// aggregate outcome.
///
/// Exactly one record per call, in completion order. The pass counts as
/// delivered only when every call succeeded.
fn summarize_pass(
    results: Vec<(Subscription, Result<u16, DeliveryError>)>,
    now: Timestamp,
) -> (Vec<DeliveryRecord>, PassOutcome) {
    let mut records = Vec::with_capacity(results.len());
    let mut all_ok = true;
    for (sub, result) in results {
        match result {
            Ok(code) => records.push(DeliveryRecord {
                endpoint: sub.callback,
                outcome: OUTCOME_SUCCESS.to_string(),
                response_code: Some(code),
                timestamp: now,
                error: None,
            }),
            Err(e) => {
                all_ok = false;
                records.push(DeliveryRecord {
                    endpoint: sub.callback,
                    outcome: OUTCOME_FAILED.to_string(),
                    response_code: e.response_code(),
                    timestamp: now,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    let outcome = if all_ok {
        PassOutcome::Delivered
    } else {
        PassOutcome::Failed
    };
    (records, outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn sub(callback: &str) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            event_type: None,
            callback: callback.to_string(),
            query: None,
            owner: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn one_record_per_subscription_per_pass() {
        let now = Utc::now();
        let results = vec![
            (sub("http://a.test/hook"), Ok(200)),
            (sub("http://b.test/hook"), Ok(204)),
            (sub("http://c.test/hook"), Err(DeliveryError::HttpStatus(500))),
        ];

        let (records, _) = summarize_pass(results, now);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].endpoint, "http://a.test/hook");
        assert_eq!(records[1].endpoint, "http://b.test/hook");
        assert_eq!(records[2].endpoint, "http://c.test/hook");
    }

    #[test]
    fn all_successes_yield_delivered() {
        let results = vec![
            (sub("http://a.test/hook"), Ok(200)),
            (sub("http://b.test/hook"), Ok(200)),
        ];

        let (records, outcome) = summarize_pass(results, Utc::now());

        assert_eq!(outcome, PassOutcome::Delivered);
        assert!(records.iter().all(|r| r.outcome == OUTCOME_SUCCESS));
        assert!(records.iter().all(|r| r.response_code == Some(200)));
    }

    #[test]
    fn any_failure_yields_failed_with_detail() {
        let results = vec![
            (sub("http://a.test/hook"), Ok(200)),
            (sub("http://b.test/hook"), Err(DeliveryError::HttpStatus(503))),
        ];

        let (records, outcome) = summarize_pass(results, Utc::now());

        assert_eq!(outcome, PassOutcome::Failed);
        assert_eq!(records[0].outcome, OUTCOME_SUCCESS);
        assert_eq!(records[1].outcome, OUTCOME_FAILED);
        assert_eq!(records[1].response_code, Some(503));
        assert!(records[1].error.as_deref().unwrap().contains("503"));
    }

    #[test]
    fn empty_pass_summarizes_to_no_records() {
        // The dispatcher never writes anything for an event with zero
        // matching subscriptions; the fold mirrors that by producing an
        // empty log.
        let (records, _) = summarize_pass(Vec::new(), Utc::now());
        assert!(records.is_empty());
    }
}
