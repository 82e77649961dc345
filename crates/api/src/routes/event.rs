//! Route definitions for the `/events` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{event, stats, subscription};
use crate::state::AppState;
use crate::ws;

/// Routes mounted at `/events`.
///
/// ```text
/// GET    /                              -> list_events
/// POST   /                              -> create_event
/// GET    /stats                         -> event_stats
/// GET    /ws                            -> WebSocket upgrade
/// GET    /subscribe                     -> list_subscriptions
/// POST   /subscribe                     -> create_subscription
/// DELETE /subscribe/{id}                -> delete_subscription
/// GET    /correlation/{correlation_id}  -> list_by_correlation
/// GET    /{id}                          -> get_event
/// POST   /{id}/replay                   -> replay_event
/// ```
///
/// Static segments (`stats`, `ws`, `subscribe`, `correlation`) win over
/// the `{id}` capture, so they must not collide with event IDs (IDs are
/// UUIDs, so they cannot).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(event::list_events).post(event::create_event))
        .route("/stats", get(stats::event_stats))
        .route("/ws", get(ws::ws_handler))
        .route(
            "/subscribe",
            get(subscription::list_subscriptions).post(subscription::create_subscription),
        )
        .route("/subscribe/{id}", delete(subscription::delete_subscription))
        .route(
            "/correlation/{correlation_id}",
            get(event::list_by_correlation),
        )
        .route("/{id}", get(event::get_event))
        .route("/{id}/replay", post(event::replay_event))
}
