//! Handlers for the `/events/stats` projection.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use veris_core::types::Timestamp;
use veris_db::repositories::EventRepo;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /events/stats`.
///
/// Both bounds apply to `event_time` and are optional.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub from_date: Option<Timestamp>,
    pub to_date: Option<Timestamp>,
}

/// Event count projections, grouped by classification axes.
#[derive(Debug, Serialize)]
pub struct EventStats {
    pub total: i64,
    pub by_event_type: BTreeMap<String, i64>,
    pub by_source: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
}

/// GET /api/v1/events/stats
///
/// Aggregate event counts, optionally windowed by `event_time`.
pub async fn event_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsQuery>,
) -> AppResult<Json<DataResponse<EventStats>>> {
    let (from, to) = (params.from_date, params.to_date);

    let total = EventRepo::total(&state.pool, from, to).await?;
    let by_type = EventRepo::counts_by_type(&state.pool, from, to).await?;
    let by_source = EventRepo::counts_by_source(&state.pool, from, to).await?;
    let by_priority = EventRepo::counts_by_priority(&state.pool, from, to).await?;

    let stats = EventStats {
        total,
        by_event_type: by_type.into_iter().collect(),
        by_source: by_source.into_iter().collect(),
        by_priority: by_priority.into_iter().collect(),
    };

    Ok(Json(DataResponse { data: stats }))
}
