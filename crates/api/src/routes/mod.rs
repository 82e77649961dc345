pub mod event;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /events                              list, create
/// /events/stats                        event count projections
/// /events/ws                           WebSocket (realtime stream)
/// /events/subscribe                    list, register callback subscriptions
/// /events/subscribe/{id}               remove callback subscription
/// /events/correlation/{correlation_id} events sharing a correlation ID
/// /events/{id}                         get single event
/// /events/{id}/replay                  re-run delivery (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/events", event::router())
}
