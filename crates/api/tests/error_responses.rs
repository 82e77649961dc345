//! Tests for `AppError` HTTP mapping.
//!
//! Verifies that domain and database errors convert into the expected
//! status codes and `{ "error", "code" }` JSON bodies.

use assert_matches::assert_matches;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use veris_api::error::AppError;
use veris_core::error::CoreError;

#[test]
fn core_errors_convert_via_from() {
    let err: AppError = CoreError::Validation("bad priority".into()).into();
    assert_matches!(err, AppError::Core(CoreError::Validation(_)));

    let err: AppError = CoreError::NotFound {
        entity: "Event",
        id: "abc".into(),
    }
    .into();
    assert_matches!(err, AppError::Core(CoreError::NotFound { entity: "Event", .. }));
}

#[tokio::test]
async fn not_found_maps_to_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Event",
        id: "abc".into(),
    });
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_maps_to_400() {
    let err = AppError::Core(CoreError::Validation("event_type is required".into()));
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conflict_maps_to_409() {
    let err = AppError::Core(CoreError::Conflict("already delivered".into()));
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn database_row_not_found_maps_to_404() {
    let err = AppError::Database(sqlx::Error::RowNotFound);
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn internal_error_is_sanitized_500() {
    let err = AppError::InternalError("connection pool exhausted".into());
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
