//! Well-known classification values and ingestion field validation.
//!
//! These must match the values stored in the `events.priority`,
//! `events.severity`, and `events.domain` columns and referenced by the
//! dispatcher, the stats projections, and the API handlers.

use crate::error::CoreError;

/// Accepted `priority` values, lowest first.
pub const PRIORITIES: [&str; 4] = ["low", "normal", "high", "urgent"];

/// Accepted `severity` values, mildest first.
pub const SEVERITIES: [&str; 3] = ["minor", "major", "critical"];

/// Default priority assigned when the producer omits one.
pub const DEFAULT_PRIORITY: &str = "normal";

/// Default severity assigned when the producer omits one.
pub const DEFAULT_SEVERITY: &str = "minor";

/// Default business-area tag assigned when the producer omits one.
pub const DEFAULT_DOMAIN: &str = "general";

/// Maximum length of the `event_type` and `source` tags.
const MAX_TAG_LEN: usize = 256;

/// Validate the two required ingestion fields.
///
/// Rules:
/// - `event_type` and `source` must be non-empty after trimming.
/// - Neither may exceed `MAX_TAG_LEN` characters.
pub fn validate_required(event_type: &str, source: &str) -> Result<(), CoreError> {
    for (field, value) in [("event_type", event_type), ("source", source)] {
        if value.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "{field} must not be empty"
            )));
        }
        if value.len() > MAX_TAG_LEN {
            return Err(CoreError::Validation(format!(
                "{field} must not exceed {MAX_TAG_LEN} characters"
            )));
        }
    }
    Ok(())
}

/// Validate an explicit `priority` value.
pub fn validate_priority(priority: &str) -> Result<(), CoreError> {
    if PRIORITIES.contains(&priority) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown priority \"{priority}\""
        )))
    }
}

/// Validate an explicit `severity` value.
pub fn validate_severity(severity: &str) -> Result<(), CoreError> {
    if SEVERITIES.contains(&severity) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown severity \"{severity}\""
        )))
    }
}

/// Evaluate an event-type filter against a concrete event type.
///
/// An absent filter matches every event. Used by both the subscription
/// registry (callback fan-out) and per-connection realtime filters.
pub fn filter_matches(filter: Option<&str>, event_type: &str) -> bool {
    match filter {
        Some(wanted) => wanted == event_type,
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -- validate_required ---------------------------------------------------

    #[test]
    fn required_fields_accepted() {
        assert!(validate_required("ConsentRevoked", "consent-service").is_ok());
    }

    #[test]
    fn empty_event_type_rejected() {
        assert_matches!(
            validate_required("", "consent-service"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn whitespace_source_rejected() {
        assert_matches!(
            validate_required("ConsentRevoked", "   "),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn oversized_tag_rejected() {
        let long = "a".repeat(MAX_TAG_LEN + 1);
        assert!(validate_required(&long, "svc").is_err());
    }

    // -- validate_priority / validate_severity -------------------------------

    #[test]
    fn known_priorities_accepted() {
        for p in PRIORITIES {
            assert!(validate_priority(p).is_ok());
        }
    }

    #[test]
    fn unknown_priority_rejected() {
        assert!(validate_priority("extreme").is_err());
    }

    #[test]
    fn known_severities_accepted() {
        for s in SEVERITIES {
            assert!(validate_severity(s).is_ok());
        }
    }

    #[test]
    fn unknown_severity_rejected() {
        assert!(validate_severity("fatal").is_err());
    }

    // -- filter_matches ------------------------------------------------------

    #[test]
    fn absent_filter_matches_everything() {
        assert!(filter_matches(None, "ConsentGranted"));
        assert!(filter_matches(None, "DsarOpened"));
    }

    #[test]
    fn filter_matches_exact_type_only() {
        assert!(filter_matches(Some("ConsentRevoked"), "ConsentRevoked"));
        assert!(!filter_matches(Some("ConsentRevoked"), "ConsentGranted"));
    }
}
