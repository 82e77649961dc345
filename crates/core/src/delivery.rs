//! Callback delivery state machine and retry backoff law.
//!
//! Pure functions shared by the dispatcher and the background sweeper.
//! All timing math lives here so the schedule can be verified without a
//! database or an HTTP client.
//!
//! State transitions per dispatch pass:
//!
//! ```text
//! pending --(every callback 2xx)--------------------> delivered  (terminal)
//! pending --(failure, attempts <  max_attempts)-----> pending    (next_attempt advanced)
//! pending --(failure, attempts == max_attempts)-----> failed     (terminal)
//! ```

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Delivery status: no terminal outcome recorded yet.
pub const STATUS_PENDING: &str = "pending";

/// Delivery status: every matching callback acknowledged the event.
pub const STATUS_DELIVERED: &str = "delivered";

/// Delivery status: retries exhausted without a full acknowledgement.
pub const STATUS_FAILED: &str = "failed";

/// Delivery status reserved for consumer-side acknowledgement. Never
/// produced by the dispatcher.
pub const STATUS_ACKNOWLEDGED: &str = "acknowledged";

/// Per-attempt outcome recorded in the `delivered_to` log.
pub const OUTCOME_SUCCESS: &str = "success";

/// Per-attempt outcome recorded in the `delivered_to` log.
pub const OUTCOME_FAILED: &str = "failed";

/// Default ceiling on delivery attempts per event.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Base backoff multiplier in minutes. The delay before attempt `k + 1`
/// is `BACKOFF_BASE_MINUTES * 2^k` where `k` is the post-increment
/// attempt count (10, 20, 40 minutes for k = 1, 2, 3).
pub const BACKOFF_BASE_MINUTES: i64 = 5;

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// Aggregate outcome of one dispatch pass across all matching callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every matching callback returned 2xx.
    Delivered,
    /// At least one callback timed out, errored, or returned non-2xx.
    Failed,
}

/// The delivery sub-record fields to persist after a dispatch pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTransition {
    pub status: &'static str,
    pub attempts: i32,
    pub last_attempt: Timestamp,
    pub next_attempt: Option<Timestamp>,
}

/// Backoff delay after `attempts` failed passes (post-increment count).
pub fn backoff_delay(attempts: i32) -> chrono::Duration {
    chrono::Duration::minutes(BACKOFF_BASE_MINUTES * 2i64.pow(attempts.max(0) as u32))
}

/// Compute the next delivery sub-record state after a dispatch pass.
///
/// `attempts` and `max_attempts` are the values read before the pass.
/// A successful pass is terminal and does not consume an attempt. A failed
/// pass increments `attempts`; when the incremented count reaches
/// `max_attempts` the event is terminally failed and no retry is
/// scheduled, otherwise `next_attempt = now + backoff_delay(attempts)`.
pub fn apply_pass(
    attempts: i32,
    max_attempts: i32,
    outcome: PassOutcome,
    now: Timestamp,
) -> DeliveryTransition {
    match outcome {
        PassOutcome::Delivered => DeliveryTransition {
            status: STATUS_DELIVERED,
            attempts,
            last_attempt: now,
            next_attempt: None,
        },
        PassOutcome::Failed => {
            let attempts = (attempts + 1).min(max_attempts);
            if attempts >= max_attempts {
                DeliveryTransition {
                    status: STATUS_FAILED,
                    attempts,
                    last_attempt: now,
                    next_attempt: None,
                }
            } else {
                DeliveryTransition {
                    status: STATUS_PENDING,
                    attempts,
                    last_attempt: now,
                    next_attempt: Some(now + backoff_delay(attempts)),
                }
            }
        }
    }
}

/// Whether a status is terminal (no further dispatch passes allowed).
pub fn is_terminal(status: &str) -> bool {
    status == STATUS_DELIVERED || status == STATUS_FAILED
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    // -- backoff_delay -------------------------------------------------------

    #[test]
    fn backoff_schedule_is_10_20_40_minutes() {
        assert_eq!(backoff_delay(1), chrono::Duration::minutes(10));
        assert_eq!(backoff_delay(2), chrono::Duration::minutes(20));
        assert_eq!(backoff_delay(3), chrono::Duration::minutes(40));
    }

    // -- apply_pass ----------------------------------------------------------

    #[test]
    fn success_is_terminal_and_consumes_no_attempt() {
        let now = Utc::now();
        let t = apply_pass(1, DEFAULT_MAX_ATTEMPTS, PassOutcome::Delivered, now);
        assert_eq!(t.status, STATUS_DELIVERED);
        assert_eq!(t.attempts, 1);
        assert_eq!(t.last_attempt, now);
        assert!(t.next_attempt.is_none());
    }

    #[test]
    fn first_failure_schedules_retry_in_10_minutes() {
        let now = Utc::now();
        let t = apply_pass(0, DEFAULT_MAX_ATTEMPTS, PassOutcome::Failed, now);
        assert_eq!(t.status, STATUS_PENDING);
        assert_eq!(t.attempts, 1);
        assert_eq!(t.next_attempt, Some(now + chrono::Duration::minutes(10)));
    }

    #[test]
    fn second_failure_schedules_retry_in_20_minutes() {
        let now = Utc::now();
        let t = apply_pass(1, DEFAULT_MAX_ATTEMPTS, PassOutcome::Failed, now);
        assert_eq!(t.status, STATUS_PENDING);
        assert_eq!(t.attempts, 2);
        assert_eq!(t.next_attempt, Some(now + chrono::Duration::minutes(20)));
    }

    #[test]
    fn failure_at_max_attempts_is_terminal_with_no_retry() {
        let now = Utc::now();
        let t = apply_pass(2, DEFAULT_MAX_ATTEMPTS, PassOutcome::Failed, now);
        assert_eq!(t.status, STATUS_FAILED);
        assert_eq!(t.attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(t.next_attempt.is_none());
    }

    #[test]
    fn attempts_never_exceed_max_attempts() {
        let now = Utc::now();
        // A pass raced past the ceiling must still clamp.
        let t = apply_pass(5, DEFAULT_MAX_ATTEMPTS, PassOutcome::Failed, now);
        assert_eq!(t.attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(t.status, STATUS_FAILED);
    }

    #[test]
    fn three_consecutive_failures_reach_failed_exactly_at_max() {
        let now = Utc::now();
        let mut attempts = 0;
        let mut status = STATUS_PENDING;
        for _ in 0..3 {
            let t = apply_pass(attempts, DEFAULT_MAX_ATTEMPTS, PassOutcome::Failed, now);
            attempts = t.attempts;
            status = t.status;
        }
        assert_eq!(attempts, 3);
        assert_eq!(status, STATUS_FAILED);
    }

    // -- is_terminal ---------------------------------------------------------

    #[test]
    fn delivered_and_failed_are_terminal() {
        assert!(is_terminal(STATUS_DELIVERED));
        assert!(is_terminal(STATUS_FAILED));
        assert!(!is_terminal(STATUS_PENDING));
        assert!(!is_terminal(STATUS_ACKNOWLEDGED));
    }
}
