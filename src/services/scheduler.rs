//! Scheduler tick: select due notifications, claim them and dispatch them
//! through a bounded worker pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::SchedulerConfig;
use crate::db::models::{DeliveryAttempt, ReleaseNotification};
use crate::db::ReleaseNotificationRepository;
use crate::error::{AppError, AppResult};
use crate::services::dispatcher::{DispatchOutcome, Dispatcher};
use crate::services::eligibility;

/// Counters for one tick, logged by the worker loop.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub selected: usize,
    pub skipped: usize,
    pub sent: usize,
    pub failed: usize,
    pub superseded: usize,
}

pub struct Scheduler {
    pool: SqlitePool,
    dispatcher: Arc<Dispatcher>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(pool: SqlitePool, dispatcher: Arc<Dispatcher>, config: SchedulerConfig) -> Self {
        Self {
            pool,
            dispatcher,
            config,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.config.tick_interval_seconds)
    }

    /// Run one tick at `now`. Returns once every dispatch started by this tick
    /// has finished.
    ///
    /// `Err` means the due entries could not be selected at all; failures of
    /// individual entries are absorbed and recorded on the entries themselves.
    pub async fn tick(&self, now: DateTime<Utc>) -> AppResult<TickReport> {
        let claim_cutoff = now - chrono::Duration::seconds(self.config.claim_timeout_seconds as i64);
        let rows = ReleaseNotificationRepository::find_due(
            &self.pool,
            now,
            claim_cutoff,
            i64::from(self.config.batch_size),
        )
        .await?;

        let mut report = TickReport {
            selected: rows.len(),
            ..Default::default()
        };
        if rows.is_empty() {
            return Ok(report);
        }

        tracing::debug!("Scheduler tick selected {} due notification(s)", rows.len());

        let permits = Arc::new(Semaphore::new(self.config.worker_concurrency.max(1) as usize));
        let mut workers = JoinSet::new();

        for row in rows {
            let id = row.id.clone();
            let entry = match ReleaseNotification::try_from(row) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!("Release notification {} is unreadable: {}", id, e);
                    self.fail(&id, format!("unreadable record: {}", e), now).await;
                    report.failed += 1;
                    continue;
                }
            };

            if let Err(reason) = eligibility::check(&entry, now) {
                tracing::debug!(
                    "Skipping release notification {}: {}",
                    entry.id,
                    reason.as_str()
                );
                report.skipped += 1;
                continue;
            }

            match ReleaseNotificationRepository::claim(&self.pool, &entry.id, now, claim_cutoff)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to claim release notification {}: {}", entry.id, e);
                    report.skipped += 1;
                    continue;
                }
            }

            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Internal(e.into()))?;
            let dispatcher = self.dispatcher.clone();

            workers.spawn(async move {
                let id = entry.id.clone();
                // Inner task so a panicking sender is reported with the entry id.
                let result =
                    tokio::spawn(async move { dispatcher.dispatch(&entry).await }).await;
                drop(permit);
                (id, result)
            });
        }

        while let Some(joined) = workers.join_next().await {
            let (id, result) = match joined {
                Ok(v) => v,
                Err(e) => {
                    tracing::error!("Scheduler worker aborted: {}", e);
                    continue;
                }
            };

            match result {
                Ok(Ok(DispatchOutcome::Sent)) => report.sent += 1,
                Ok(Ok(DispatchOutcome::Failed)) => report.failed += 1,
                Ok(Ok(DispatchOutcome::Superseded)) => report.superseded += 1,
                Ok(Err(e)) => {
                    tracing::error!("Dispatch of release notification {} failed: {}", id, e);
                    self.fail(&id, format!("dispatch error: {}", e), now).await;
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Dispatch of release notification {} panicked: {}", id, e);
                    self.fail(&id, "dispatch panicked".to_string(), now).await;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn fail(&self, id: &str, error: String, now: DateTime<Utc>) {
        let attempt = DeliveryAttempt {
            timestamp: Utc::now(),
            channel: None,
            success: false,
            error: Some(error),
        };
        if let Err(e) = ReleaseNotificationRepository::mark_failed(&self.pool, id, &attempt, now).await
        {
            tracing::error!("Failed to mark release notification {} as failed: {}", id, e);
        }
    }
}
