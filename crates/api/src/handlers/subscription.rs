//! Handlers for callback subscription management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;
use veris_core::error::CoreError;
use veris_db::models::subscription::{CreateSubscription, Subscription};
use veris_db::repositories::SubscriptionRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/events/subscribe
///
/// List all registered callback subscriptions in registration order.
pub async fn list_subscriptions(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Subscription>>>> {
    let subscriptions = SubscriptionRepo::list(&state.pool).await?;

    Ok(Json(DataResponse {
        data: subscriptions,
    }))
}

/// POST /api/v1/events/subscribe
///
/// Register a callback subscription. The optional `event_type` narrows
/// delivery to one type; omitting it subscribes to every event.
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(input): Json<CreateSubscription>,
) -> AppResult<impl IntoResponse> {
    if !input.callback.starts_with("http://") && !input.callback.starts_with("https://") {
        return Err(AppError::Core(CoreError::Validation(
            "callback must be an http(s) URL".to_string(),
        )));
    }

    let subscription = SubscriptionRepo::create(
        &state.pool,
        input.event_type.as_deref(),
        &input.callback,
        input.query.as_deref(),
        input.owner.as_deref(),
    )
    .await?;

    tracing::info!(
        subscription_id = %subscription.id,
        event_type = ?subscription.event_type,
        callback = %subscription.callback,
        "Subscription registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "data": { "subscription_id": subscription.id }
        })),
    ))
}

/// DELETE /api/v1/events/subscribe/{id}
///
/// Remove a callback subscription. Returns 204 on success, 404 if the
/// subscription does not exist.
pub async fn delete_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let removed = SubscriptionRepo::delete(&state.pool, subscription_id).await?;

    if !removed {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Subscription",
            id: subscription_id.to_string(),
        }));
    }

    tracing::info!(subscription_id = %subscription_id, "Subscription removed");

    Ok(StatusCode::NO_CONTENT)
}
