//! Tests for the pagination clamping contract on list endpoints.
//!
//! `GET /events` clamps `limit` into `1..=100` with a default of 20 and
//! floors `offset` at 0; these tests pin the exact clamp calls the
//! handler makes.

use veris_api::query::PaginationParams;
use veris_core::paging::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};

fn clamp(page: &PaginationParams) -> (i64, i64) {
    (
        clamp_limit(page.limit, DEFAULT_LIMIT, MAX_LIMIT),
        clamp_offset(page.offset),
    )
}

#[test]
fn missing_params_use_defaults() {
    let page: PaginationParams = serde_json::from_value(serde_json::json!({})).unwrap();

    assert_eq!(clamp(&page), (DEFAULT_LIMIT, 0));
}

#[test]
fn oversized_limit_is_capped() {
    let page: PaginationParams =
        serde_json::from_value(serde_json::json!({ "limit": 500, "offset": 40 })).unwrap();

    assert_eq!(clamp(&page), (MAX_LIMIT, 40));
}

#[test]
fn negative_values_are_floored() {
    let page: PaginationParams =
        serde_json::from_value(serde_json::json!({ "limit": -3, "offset": -10 })).unwrap();

    assert_eq!(clamp(&page), (1, 0));
}
