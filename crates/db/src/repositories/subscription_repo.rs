//! Repository for the `subscriptions` table.
//!
//! Subscriptions are durable: unlike live realtime connections they
//! survive a process restart.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::subscription::Subscription;

/// Column list for `subscriptions` queries.
const COLUMNS: &str = "id, event_type, callback, query, owner, created_at";

/// Provides CRUD operations for callback subscriptions.
pub struct SubscriptionRepo;

impl SubscriptionRepo {
    /// Register a new subscription, returning the stored row.
    pub async fn create(
        pool: &PgPool,
        event_type: Option<&str>,
        callback: &str,
        query_filter: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Subscription, sqlx::Error> {
        let query = format!(
            "INSERT INTO subscriptions (id, event_type, callback, query, owner) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(Uuid::new_v4())
            .bind(event_type)
            .bind(callback)
            .bind(query_filter)
            .bind(owner)
            .fetch_one(pool)
            .await
    }

    /// List all subscriptions in registration order.
    pub async fn list(pool: &PgPool) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM subscriptions ORDER BY created_at ASC");
        sqlx::query_as::<_, Subscription>(&query)
            .fetch_all(pool)
            .await
    }

    /// Subscriptions matching an event type (untyped subscriptions match
    /// everything), in registration order.
    pub async fn list_matching(
        pool: &PgPool,
        event_type: &str,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM subscriptions \
             WHERE event_type IS NULL OR event_type = $1 \
             ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, Subscription>(&query)
            .bind(event_type)
            .fetch_all(pool)
            .await
    }

    /// Remove a subscription. Returns `false` when the id is unknown.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
