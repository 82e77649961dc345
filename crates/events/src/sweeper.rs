//! Periodic background sweep over the event store.
//!
//! Each tick runs three phases in order: a full dispatch pass for
//! events that were never dispatched (ingestion-time dispatch crashed
//! or was skipped), a delivery-only retry pass for pending events whose
//! backoff window has elapsed, and a purge of expired rows. A single
//! sweeper instance is assumed; overlapping sweeps are not coordinated
//! beyond the version check inside the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use veris_db::repositories::EventRepo;
use veris_db::DbPool;

use crate::dispatcher::Dispatcher;

/// Cap on never-dispatched events handled per sweep.
const UNPROCESSED_BATCH: i64 = 10;

/// Cap on due retries handled per sweep.
const RETRY_BATCH: i64 = 5;

pub struct Sweeper {
    pool: DbPool,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(pool: DbPool, dispatcher: Arc<Dispatcher>, interval: Duration) -> Self {
        Self {
            pool,
            dispatcher,
            interval,
        }
    }

    /// Run the sweep loop until `cancel` is triggered.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            unprocessed_batch = UNPROCESSED_BATCH,
            retry_batch = RETRY_BATCH,
            "Event sweeper started"
        );

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// One sweep: unprocessed dispatch, due retries, TTL purge.
    async fn sweep(&self) {
        match EventRepo::due_unprocessed(&self.pool, UNPROCESSED_BATCH).await {
            Ok(events) => {
                for event in &events {
                    if let Err(e) = self.dispatcher.run_pass(event).await {
                        tracing::error!(event_id = %event.id, error = %e, "Sweep dispatch failed");
                        self.quarantine(event.id, &e.to_string()).await;
                    }
                }
                if !events.is_empty() {
                    tracing::debug!(count = events.len(), "Sweep: dispatched unprocessed events");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Sweep: failed to load unprocessed events");
            }
        }

        match EventRepo::due_retries(&self.pool, RETRY_BATCH).await {
            Ok(events) => {
                for event in &events {
                    if let Err(e) = self.dispatcher.deliver(event).await {
                        tracing::error!(event_id = %event.id, error = %e, "Sweep retry failed");
                    }
                }
                if !events.is_empty() {
                    tracing::debug!(count = events.len(), "Sweep: retried pending deliveries");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Sweep: failed to load due retries");
            }
        }

        match EventRepo::purge_expired(&self.pool).await {
            Ok(purged) => {
                if purged > 0 {
                    tracing::info!(purged, "Sweep: purged expired events");
                } else {
                    tracing::debug!("Sweep: no expired events");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Sweep: purge failed");
            }
        }
    }

    /// Mark an event so a failed dispatch pass is still considered
    /// attempted and its error is recorded for inspection.
    async fn quarantine(&self, id: veris_core::types::EventId, error: &str) {
        if let Err(e) = EventRepo::set_processing_error(&self.pool, id, error).await {
            tracing::error!(event_id = %id, error = %e, "Failed to record processing error");
        }
        if let Err(e) = EventRepo::mark_dispatch_attempted(&self.pool, id).await {
            tracing::error!(event_id = %id, error = %e, "Failed to mark dispatch attempted");
        }
    }
}
