//! Repository for the `events` table.
//!
//! Delivery-state writes go through [`EventRepo::record_pass`], which is a
//! compare-and-swap on `delivery_version`: the ingestion-triggered dispatch
//! pass and a sweeper tick can target the same event concurrently, and the
//! version check guarantees one of them loses cleanly instead of silently
//! overwriting `attempts`/`delivery_status`.

use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use veris_core::types::Timestamp;

use crate::models::event::{Event, EventFilter, EventSummary, NewEvent};

/// Column list for full `events` queries.
const EVENT_COLUMNS: &str = "\
    id, event_type, source, title, description, priority, severity, domain, \
    correlation_id, parent_event_id, event_time, data, entities, characteristics, \
    delivery_status, attempts, max_attempts, last_attempt, next_attempt, \
    delivered_to, delivery_version, dispatch_attempted, processing_error, \
    expires_at, created_at";

/// Column list for list views (`data` and the delivery log omitted).
const SUMMARY_COLUMNS: &str = "\
    id, event_type, source, title, description, priority, severity, domain, \
    correlation_id, parent_event_id, event_time, entities, characteristics, \
    delivery_status, attempts, max_attempts, last_attempt, next_attempt, \
    dispatch_attempted, expires_at, created_at";

/// Provides read/write operations for events.
pub struct EventRepo;

impl EventRepo {
    // -----------------------------------------------------------------------
    // Ingestion / lookup
    // -----------------------------------------------------------------------

    /// Insert a resolved event, returning the stored row.
    pub async fn insert(pool: &PgPool, ev: &NewEvent) -> Result<Event, sqlx::Error> {
        let query = format!(
            "INSERT INTO events \
                (id, event_type, source, title, description, priority, severity, domain, \
                 correlation_id, parent_event_id, event_time, data, entities, characteristics, \
                 max_attempts, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(ev.id)
            .bind(&ev.event_type)
            .bind(&ev.source)
            .bind(&ev.title)
            .bind(&ev.description)
            .bind(&ev.priority)
            .bind(&ev.severity)
            .bind(&ev.domain)
            .bind(&ev.correlation_id)
            .bind(ev.parent_event_id)
            .bind(ev.event_time)
            .bind(&ev.data)
            .bind(&ev.entities)
            .bind(&ev.characteristics)
            .bind(ev.max_attempts)
            .bind(ev.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find an event by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All events sharing a correlation id, oldest first.
    pub async fn list_by_correlation(
        pool: &PgPool,
        correlation_id: &str,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE correlation_id = $1 \
             ORDER BY event_time ASC"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(correlation_id)
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Filtered listing
    // -----------------------------------------------------------------------

    /// Filtered page of event summaries, newest `event_time` first.
    pub async fn list(
        pool: &PgPool,
        filter: &EventFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventSummary>, sqlx::Error> {
        let mut idx = 1;
        let where_sql = Self::filter_sql(filter, &mut idx);
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM events {where_sql} \
             ORDER BY event_time DESC \
             LIMIT ${idx} OFFSET ${}",
            idx + 1
        );
        let q = sqlx::query_as::<_, EventSummary>(&query);
        Self::bind_filter(q, filter)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Total row count for the same filter as [`EventRepo::list`].
    pub async fn count(pool: &PgPool, filter: &EventFilter) -> Result<i64, sqlx::Error> {
        let mut idx = 1;
        let where_sql = Self::filter_sql(filter, &mut idx);
        let query = format!("SELECT COUNT(*) FROM events {where_sql}");
        let q = sqlx::query_scalar::<_, i64>(&query);
        Self::bind_filter_scalar(q, filter).fetch_one(pool).await
    }

    /// Build the `WHERE` fragment for an [`EventFilter`].
    ///
    /// Placeholder numbering starts at `*idx`; `idx` is left pointing at
    /// the next free placeholder. [`EventRepo::bind_filter`] must bind in
    /// exactly the same order clauses are pushed here.
    fn filter_sql(filter: &EventFilter, idx: &mut usize) -> String {
        let mut clauses: Vec<String> = Vec::new();
        let mut push = |clause: String, idx: &mut usize| {
            clauses.push(clause);
            *idx += 1;
        };

        if filter.event_type.is_some() {
            push(format!("event_type = ${idx}"), idx);
        }
        if filter.source.is_some() {
            push(format!("source = ${idx}"), idx);
        }
        if filter.entity_type.is_some() || filter.entity_id.is_some() {
            push(format!("entities @> ${idx}"), idx);
        }
        if filter.priority.is_some() {
            push(format!("priority = ${idx}"), idx);
        }
        if filter.severity.is_some() {
            push(format!("severity = ${idx}"), idx);
        }
        if filter.processed.is_some() {
            push(format!("dispatch_attempted = ${idx}"), idx);
        }
        if filter.correlation_id.is_some() {
            push(format!("correlation_id = ${idx}"), idx);
        }
        if filter.from_date.is_some() {
            push(format!("event_time >= ${idx}"), idx);
        }
        if filter.to_date.is_some() {
            push(format!("event_time <= ${idx}"), idx);
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        }
    }

    /// JSONB containment pattern for the entity filter.
    fn entity_pattern(filter: &EventFilter) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if let Some(t) = &filter.entity_type {
            obj.insert("entity_type".to_string(), serde_json::json!(t));
        }
        if let Some(i) = &filter.entity_id {
            obj.insert("entity_id".to_string(), serde_json::json!(i));
        }
        serde_json::Value::Array(vec![serde_json::Value::Object(obj)])
    }

    fn bind_filter<'q, O>(
        mut q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
        filter: &'q EventFilter,
    ) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments> {
        if let Some(v) = &filter.event_type {
            q = q.bind(v.as_str());
        }
        if let Some(v) = &filter.source {
            q = q.bind(v.as_str());
        }
        if filter.entity_type.is_some() || filter.entity_id.is_some() {
            q = q.bind(Self::entity_pattern(filter));
        }
        if let Some(v) = &filter.priority {
            q = q.bind(v.as_str());
        }
        if let Some(v) = &filter.severity {
            q = q.bind(v.as_str());
        }
        if let Some(v) = filter.processed {
            q = q.bind(v);
        }
        if let Some(v) = &filter.correlation_id {
            q = q.bind(v.as_str());
        }
        if let Some(v) = filter.from_date {
            q = q.bind(v);
        }
        if let Some(v) = filter.to_date {
            q = q.bind(v);
        }
        q
    }

    fn bind_filter_scalar<'q, O>(
        mut q: sqlx::query::QueryScalar<'q, Postgres, O, PgArguments>,
        filter: &'q EventFilter,
    ) -> sqlx::query::QueryScalar<'q, Postgres, O, PgArguments> {
        if let Some(v) = &filter.event_type {
            q = q.bind(v.as_str());
        }
        if let Some(v) = &filter.source {
            q = q.bind(v.as_str());
        }
        if filter.entity_type.is_some() || filter.entity_id.is_some() {
            q = q.bind(Self::entity_pattern(filter));
        }
        if let Some(v) = &filter.priority {
            q = q.bind(v.as_str());
        }
        if let Some(v) = &filter.severity {
            q = q.bind(v.as_str());
        }
        if let Some(v) = filter.processed {
            q = q.bind(v);
        }
        if let Some(v) = &filter.correlation_id {
            q = q.bind(v.as_str());
        }
        if let Some(v) = filter.from_date {
            q = q.bind(v);
        }
        if let Some(v) = filter.to_date {
            q = q.bind(v);
        }
        q
    }

    // -----------------------------------------------------------------------
    // Sweeper scans
    // -----------------------------------------------------------------------

    /// Events no dispatch pass has touched yet and whose retry clock (if
    /// any) has elapsed. Oldest first.
    pub async fn due_unprocessed(pool: &PgPool, limit: i64) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE dispatch_attempted = false \
               AND (next_attempt IS NULL OR next_attempt <= NOW()) \
             ORDER BY created_at ASC LIMIT $1"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Pending events due for a delivery retry. Oldest first.
    pub async fn due_retries(pool: &PgPool, limit: i64) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE delivery_status = 'pending' \
               AND dispatch_attempted = true \
               AND next_attempt IS NOT NULL AND next_attempt <= NOW() \
               AND attempts < max_attempts \
             ORDER BY created_at ASC LIMIT $1"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Delivery-state writes
    // -----------------------------------------------------------------------

    /// Record the outcome of one dispatch pass, guarded by the delivery
    /// version.
    ///
    /// `records` is a JSON array of delivery attempts appended to the
    /// `delivered_to` log. Returns `false` when `expected_version` no
    /// longer matches, meaning a concurrent pass already recorded an
    /// outcome and this write was dropped.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_pass(
        pool: &PgPool,
        id: Uuid,
        expected_version: i64,
        status: &str,
        attempts: i32,
        last_attempt: Timestamp,
        next_attempt: Option<Timestamp>,
        records: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE events SET \
                 delivery_status = $3, \
                 attempts = $4, \
                 last_attempt = $5, \
                 next_attempt = $6, \
                 delivered_to = delivered_to || $7, \
                 delivery_version = delivery_version + 1 \
             WHERE id = $1 AND delivery_version = $2",
        )
        .bind(id)
        .bind(expected_version)
        .bind(status)
        .bind(attempts)
        .bind(last_attempt)
        .bind(next_attempt)
        .bind(records)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark that a full dispatch pass was attempted, whatever its outcome.
    pub async fn mark_dispatch_attempted(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE events SET dispatch_attempted = true WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a sweep-time failure for manual inspection.
    pub async fn set_processing_error(
        pool: &PgPool,
        id: Uuid,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE events SET processing_error = $2 WHERE id = $1")
            .bind(id)
            .bind(error)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Reset a non-delivered event for replay: back to `pending` with a
    /// fresh attempt budget. The `delivered_to` history is kept as an
    /// audit trail.
    pub async fn reset_for_replay(pool: &PgPool, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        let query = format!(
            "UPDATE events SET \
                 delivery_status = 'pending', \
                 attempts = 0, \
                 last_attempt = NULL, \
                 next_attempt = NULL, \
                 dispatch_attempted = false, \
                 processing_error = NULL, \
                 delivery_version = delivery_version + 1 \
             WHERE id = $1 AND delivery_status <> 'delivered' \
             RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Retention
    // -----------------------------------------------------------------------

    /// Delete events past their TTL. Returns the number of purged rows.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Stats projections
    // -----------------------------------------------------------------------

    /// Total event count, optionally windowed by `event_time`.
    pub async fn total(
        pool: &PgPool,
        from_date: Option<Timestamp>,
        to_date: Option<Timestamp>,
    ) -> Result<i64, sqlx::Error> {
        let (where_sql, _) = Self::window_sql(from_date, to_date);
        let query = format!("SELECT COUNT(*) FROM events {where_sql}");
        let mut q = sqlx::query_scalar::<_, i64>(&query);
        if let Some(f) = from_date {
            q = q.bind(f);
        }
        if let Some(t) = to_date {
            q = q.bind(t);
        }
        q.fetch_one(pool).await
    }

    /// Counts grouped by `event_type`, optionally windowed.
    pub async fn counts_by_type(
        pool: &PgPool,
        from_date: Option<Timestamp>,
        to_date: Option<Timestamp>,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        Self::counts_by(pool, "event_type", from_date, to_date).await
    }

    /// Counts grouped by `source`, optionally windowed.
    pub async fn counts_by_source(
        pool: &PgPool,
        from_date: Option<Timestamp>,
        to_date: Option<Timestamp>,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        Self::counts_by(pool, "source", from_date, to_date).await
    }

    /// Counts grouped by `priority`, optionally windowed.
    pub async fn counts_by_priority(
        pool: &PgPool,
        from_date: Option<Timestamp>,
        to_date: Option<Timestamp>,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        Self::counts_by(pool, "priority", from_date, to_date).await
    }

    /// GROUP BY projection over a whitelisted column.
    async fn counts_by(
        pool: &PgPool,
        column: &'static str,
        from_date: Option<Timestamp>,
        to_date: Option<Timestamp>,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        let (where_sql, _) = Self::window_sql(from_date, to_date);
        let query = format!(
            "SELECT {column}, COUNT(*) FROM events {where_sql} \
             GROUP BY {column} ORDER BY COUNT(*) DESC, {column}"
        );
        let mut q = sqlx::query_as::<_, (String, i64)>(&query);
        if let Some(f) = from_date {
            q = q.bind(f);
        }
        if let Some(t) = to_date {
            q = q.bind(t);
        }
        q.fetch_all(pool).await
    }

    /// `WHERE` fragment for an optional `event_time` window.
    fn window_sql(from_date: Option<Timestamp>, to_date: Option<Timestamp>) -> (String, usize) {
        let mut clauses: Vec<String> = Vec::new();
        let mut idx = 1;
        if from_date.is_some() {
            clauses.push(format!("event_time >= ${idx}"));
            idx += 1;
        }
        if to_date.is_some() {
            clauses.push(format!("event_time <= ${idx}"));
            idx += 1;
        }
        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (sql, idx)
    }
}
