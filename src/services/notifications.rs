use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::models::{
    InAppNotification, NotificationStats, NotificationStatus, ReleaseKind, ReleaseNotification,
    SubjectKind,
};
use crate::db::{InAppNotificationRepository, ReleaseNotificationRepository};
use crate::error::{AppError, AppResult};
use crate::services::fanout::{
    BatchScheduleReport, FanoutBuilder, PreferencesInput, ReleaseSubject,
};
use crate::services::interest::InterestSource;

/// Entry point used by the HTTP layer and by catalog triggers.
///
/// Wraps the fan-out builder, the interest source and the record store so
/// callers never touch repositories directly.
#[derive(Clone)]
pub struct ReleaseNotificationService {
    pool: SqlitePool,
    fanout: FanoutBuilder,
    interest: Arc<dyn InterestSource>,
}

impl ReleaseNotificationService {
    pub fn new(pool: SqlitePool, fanout: FanoutBuilder, interest: Arc<dyn InterestSource>) -> Self {
        Self {
            pool,
            fanout,
            interest,
        }
    }

    /// Schedule (or reschedule) the announcement of `subject` for one user.
    pub async fn schedule_release(
        &self,
        user_id: &str,
        event_id: &str,
        subject: &ReleaseSubject,
        release_at: DateTime<Utc>,
        preferences: &PreferencesInput,
    ) -> AppResult<ReleaseNotification> {
        self.fanout
            .schedule(
                &self.pool,
                user_id,
                event_id,
                subject,
                release_at,
                preferences,
                Utc::now(),
            )
            .await
    }

    /// Schedule the announcement for every user interested in `event_id`.
    pub async fn schedule_for_interested_users(
        &self,
        event_id: &str,
        subject: &ReleaseSubject,
        release_at: DateTime<Utc>,
        override_prefs: &PreferencesInput,
    ) -> AppResult<BatchScheduleReport> {
        if event_id.trim().is_empty() {
            return Err(AppError::Validation("event id is required".to_string()));
        }

        let users = self.interest.interested_users(event_id).await?;
        if users.is_empty() {
            tracing::info!("No interested users for event {}, nothing scheduled", event_id);
        }

        Ok(self
            .fanout
            .schedule_batch(
                &self.pool,
                event_id,
                subject,
                release_at,
                &users,
                override_prefs,
                Utc::now(),
            )
            .await)
    }

    /// Cancel every pending announcement of a subject. Returns how many
    /// entries were cancelled; already sent or failed ones are untouched.
    pub async fn cancel_by_subject(
        &self,
        subject_kind: SubjectKind,
        subject_id: &str,
    ) -> AppResult<u64> {
        let cancelled = ReleaseNotificationRepository::cancel_by_subject(
            &self.pool,
            subject_kind,
            subject_id,
            Utc::now(),
        )
        .await?;

        tracing::info!(
            "Cancelled {} release notification(s) for {} {}",
            cancelled,
            subject_kind.as_str(),
            subject_id
        );

        Ok(cancelled)
    }

    /// Cancel a single entry by id.
    pub async fn cancel(&self, id: &str) -> AppResult<ReleaseNotification> {
        let cancelled = ReleaseNotificationRepository::cancel(&self.pool, id, Utc::now()).await?;

        let entry = ReleaseNotificationRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("release notification {}", id)))?;

        if !cancelled {
            return Err(AppError::Conflict(format!(
                "release notification {} is already {}",
                id,
                entry.status.as_str()
            )));
        }

        Ok(entry)
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<NotificationStatus>,
        release_kind: Option<ReleaseKind>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ReleaseNotification>> {
        ReleaseNotificationRepository::list_for_user(
            &self.pool,
            user_id,
            status,
            release_kind,
            limit,
            offset,
        )
        .await
    }

    pub async fn list_pending(&self, limit: i64) -> AppResult<Vec<ReleaseNotification>> {
        ReleaseNotificationRepository::list_pending(&self.pool, Utc::now(), limit).await
    }

    pub async fn stats(&self, event_id: Option<&str>) -> AppResult<NotificationStats> {
        ReleaseNotificationRepository::stats(&self.pool, event_id).await
    }

    pub async fn inbox(&self, user_id: &str, limit: i64) -> AppResult<Vec<InAppNotification>> {
        InAppNotificationRepository::find_by_user_id(&self.pool, user_id, limit).await
    }
}
