//! Handlers for the `/events` resource.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use veris_core::delivery::STATUS_DELIVERED;
use veris_core::error::CoreError;
use veris_core::paging::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use veris_core::types::Timestamp;
use veris_db::models::event::{CreateEvent, Event, EventFilter, NewEvent};
use veris_db::repositories::EventRepo;
use veris_events::Dispatcher;

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /events`.
///
/// All filter fields are optional and combine with AND semantics.
#[derive(Debug, Deserialize)]
pub struct EventListQuery {
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

impl EventListQuery {
    fn into_filter(self) -> EventFilter {
        EventFilter {
            event_type: self.event_type,
            source: self.source,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            priority: self.priority,
            severity: self.severity,
            processed: self.processed,
            correlation_id: self.correlation_id,
            from_date: self.from_date,
            to_date: self.to_date,
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// POST /api/v1/events
///
/// Ingest a new event. The event is persisted first, then one dispatch
/// pass (callback delivery plus realtime broadcast) runs in the
/// background. The response returns as soon as the row is durable.
pub async fn create_event(
    State(state): State<AppState>,
    Json(input): Json<CreateEvent>,
) -> AppResult<impl IntoResponse> {
    let new_event = NewEvent::from_create(input, state.config.retention_days)?;
    let event = EventRepo::insert(&state.pool, &new_event).await?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        source = %event.source,
        correlation_id = %event.correlation_id,
        "Event ingested"
    );

    spawn_dispatch(Arc::clone(&state.dispatcher), event.clone());

    Ok((StatusCode::CREATED, Json(DataResponse { data: event })))
}

/// POST /api/v1/events/{id}/replay
///
/// Reset delivery state and re-run dispatch for an event. Replaying an
/// already-delivered event is rejected with 409; duplicate callback
/// calls would be indistinguishable from fresh deliveries downstream.
pub async fn replay_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<DataResponse<Event>>> {
    let event = EventRepo::find_by_id(&state.pool, event_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Event",
            id: event_id.to_string(),
        })?;

    if event.delivery_status == STATUS_DELIVERED {
        return Err(AppError::Core(CoreError::Conflict(
            "Event has already been delivered".to_string(),
        )));
    }

    // The reset carries its own status guard, so a delivery that lands
    // between the read above and this update still cannot be replayed.
    let reset = EventRepo::reset_for_replay(&state.pool, event_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Event has already been delivered".to_string(),
            ))
        })?;

    tracing::info!(event_id = %reset.id, "Event delivery replay requested");

    spawn_dispatch(Arc::clone(&state.dispatcher), reset.clone());

    Ok(Json(DataResponse { data: reset }))
}

/// Run a dispatch pass in the background so ingestion latency does not
/// include callback round trips.
fn spawn_dispatch(dispatcher: Arc<Dispatcher>, event: Event) {
    tokio::spawn(async move {
        if let Err(e) = dispatcher.run_pass(&event).await {
            tracing::error!(event_id = %event.id, error = %e, "Background dispatch pass failed");
        }
    });
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/events
///
/// List event summaries (full payload and delivery records omitted)
/// with optional filters and pagination.
pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<EventListQuery>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<serde_json::Value>> {
    let filter = params.into_filter();
    let limit = clamp_limit(page.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = clamp_offset(page.offset);

    let events = EventRepo::list(&state.pool, &filter, limit, offset).await?;
    let total = EventRepo::count(&state.pool, &filter).await?;

    Ok(Json(serde_json::json!({
        "data": {
            "events": events,
            "pagination": {
                "total": total,
                "limit": limit,
                "offset": offset,
                "has_more": offset + (events.len() as i64) < total,
            },
        }
    })))
}

/// GET /api/v1/events/{id}
///
/// Fetch a single event with full payload and delivery records.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> AppResult<Json<DataResponse<Event>>> {
    let event = EventRepo::find_by_id(&state.pool, event_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Event",
            id: event_id.to_string(),
        })?;

    Ok(Json(DataResponse { data: event }))
}

/// GET /api/v1/events/correlation/{correlation_id}
///
/// Fetch all events sharing a correlation ID, oldest first. An unknown
/// correlation ID is a 404 rather than an empty list.
pub async fn list_by_correlation(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> AppResult<Json<DataResponse<Vec<Event>>>> {
    let events = EventRepo::list_by_correlation(&state.pool, &correlation_id).await?;

    if events.is_empty() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Correlation",
            id: correlation_id,
        }));
    }

    Ok(Json(DataResponse { data: events }))
}
