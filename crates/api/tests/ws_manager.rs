//! Unit tests for `WsManager`.
//!
//! These tests exercise the WebSocket connection manager directly, without
//! performing any HTTP upgrades. They verify add/remove semantics, filtered
//! broadcast delivery, stale connection pruning, and graceful shutdown
//! behaviour.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use chrono::Utc;
use uuid::Uuid;
use veris_api::ws::{start_heartbeat, WsManager};
use veris_db::models::event::Event;

fn sample_event(event_type: &str) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        event_type: event_type.to_string(),
        source: "consent-service".to_string(),
        title: None,
        description: None,
        priority: "normal".to_string(),
        severity: "minor".to_string(),
        domain: "general".to_string(),
        correlation_id: Uuid::new_v4().to_string(),
        parent_event_id: None,
        event_time: now,
        data: serde_json::json!({}),
        entities: serde_json::json!([]),
        characteristics: serde_json::json!([]),
        delivery_status: "pending".to_string(),
        attempts: 0,
        max_attempts: 3,
        last_attempt: None,
        next_attempt: None,
        delivered_to: serde_json::json!([]),
        delivery_version: 0,
        dispatch_attempted: false,
        processing_error: None,
        expires_at: now + chrono::Duration::days(30),
        created_at: now,
    }
}

// ---------------------------------------------------------------------------
// Test: new manager starts with zero connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_manager_has_zero_connections() {
    let manager = WsManager::new();

    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: add() increments the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_increments_connection_count() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string()).await;

    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: remove() decrements the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_decrements_connection_count() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string()).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: remove() with unknown ID is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_unknown_id_is_noop() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string()).await;
    manager.remove("nonexistent").await;

    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: unfiltered connections receive every event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_unfiltered_connections() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;

    let sent = manager.broadcast_event(&sample_event("ConsentRevoked")).await;
    assert_eq!(sent, 2);

    for rx in [&mut rx1, &mut rx2] {
        let msg = rx.recv().await.expect("should receive broadcast");
        let Message::Text(text) = msg else {
            panic!("Expected Text message, got: {msg:?}");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["data"]["event_type"], "ConsentRevoked");
    }
}

// ---------------------------------------------------------------------------
// Test: filtered connections only receive matching event types
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_respects_event_type_filter() {
    let manager = WsManager::new();

    let mut filtered = manager.add("conn-filtered".to_string()).await;
    manager
        .set_filter("conn-filtered", Some("DsarOpened".to_string()))
        .await;

    // Non-matching event: not delivered.
    let sent = manager.broadcast_event(&sample_event("ConsentRevoked")).await;
    assert_eq!(sent, 0);

    // Matching event: delivered.
    let sent = manager.broadcast_event(&sample_event("DsarOpened")).await;
    assert_eq!(sent, 1);

    let msg = filtered.recv().await.expect("should receive matching event");
    let Message::Text(text) = msg else {
        panic!("Expected Text message, got: {msg:?}");
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["data"]["event_type"], "DsarOpened");
}

// ---------------------------------------------------------------------------
// Test: clearing a filter restores delivery of all event types
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clearing_filter_restores_all_events() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string()).await;
    manager
        .set_filter("conn-1", Some("DsarOpened".to_string()))
        .await;
    assert_eq!(manager.broadcast_event(&sample_event("ConsentRevoked")).await, 0);

    manager.set_filter("conn-1", None).await;
    assert_eq!(manager.broadcast_event(&sample_event("ConsentRevoked")).await, 1);
}

// ---------------------------------------------------------------------------
// Test: connections with closed channels are pruned on broadcast
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_prunes_closed_connections() {
    let manager = WsManager::new();

    let rx1 = manager.add("conn-1".to_string()).await;
    let _rx2 = manager.add("conn-2".to_string()).await;
    assert_eq!(manager.connection_count().await, 2);

    // Simulate a dead listener by dropping its receiver.
    drop(rx1);

    let sent = manager.broadcast_event(&sample_event("ConsentRevoked")).await;
    assert_eq!(sent, 1);
    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string()).await;
    let mut rx2 = manager.add("conn-2".to_string()).await;
    assert_eq!(manager.connection_count().await, 2);

    manager.shutdown_all().await;

    // Connection count should be zero after shutdown.
    assert_eq!(manager.connection_count().await, 0);

    // Both receivers should have received a Close message.
    let msg1 = rx1.recv().await.expect("rx1 should receive Close");
    assert!(
        matches!(msg1, Message::Close(None)),
        "Expected Close(None), got: {msg1:?}"
    );

    let msg2 = rx2.recv().await.expect("rx2 should receive Close");
    assert!(
        matches!(msg2, Message::Close(None)),
        "Expected Close(None), got: {msg2:?}"
    );
}

// ---------------------------------------------------------------------------
// Test: ping_all() delivers a Ping frame to every connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_reaches_every_connection() {
    let manager = WsManager::new();

    let mut rx = manager.add("conn-1".to_string()).await;
    manager.ping_all().await;

    let msg = rx.recv().await.expect("should receive Ping");
    assert!(
        matches!(msg, Message::Ping(_)),
        "Expected Ping, got: {msg:?}"
    );
}

// ---------------------------------------------------------------------------
// Test: heartbeat task pings connections at the configured interval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_pings_at_configured_interval() {
    let manager = Arc::new(WsManager::new());
    let mut rx = manager.add("conn-1".to_string()).await;

    let handle = start_heartbeat(Arc::clone(&manager), Duration::from_millis(10));

    let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("heartbeat should tick within a second")
        .expect("channel should stay open");
    assert!(
        matches!(msg, Message::Ping(_)),
        "Expected Ping, got: {msg:?}"
    );

    handle.abort();
}
