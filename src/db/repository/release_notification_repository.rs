use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::models::{
    DeliveryAttempt, NewReleaseNotification, NotificationStats, NotificationStatus, ReleaseKind,
    ReleaseNotification, ReleaseNotificationRow, SubjectKind,
};
use crate::error::{AppError, AppResult};

const COLUMNS: &str = r#"
    id,
    user_id,
    event_id,
    release_kind,
    subject_kind,
    subject_id,
    title,
    message,
    scheduled_time,
    sent_at,
    status,
    channels_json,
    metadata_json,
    preferences_json,
    delivery_attempts_json,
    claimed_at,
    created_at,
    updated_at
"#;

/// Repository for the release notification record store.
///
/// Implementation notes:
/// - Entry ids are deterministic, so `upsert` is the only insert path. It is
///   also the only way back into `scheduled`, for failed or cancelled entries.
/// - Every status transition out of `scheduled` is guarded by
///   `WHERE status = 'scheduled'`; a writer that loses the race sees zero
///   affected rows instead of overwriting a terminal state.
/// - Claims are leases: a claim older than the caller's cutoff is ignored.
pub struct ReleaseNotificationRepository;

impl ReleaseNotificationRepository {
    /// Insert a new scheduled entry, or refresh the existing one.
    ///
    /// A `scheduled`, `failed` or `cancelled` entry gets the new fire time, text,
    /// channels, metadata and preferences and is put back to `scheduled` with
    /// its claim cleared. The attempt log is kept. A `sent` entry is left
    /// untouched and returned as is.
    pub async fn upsert(
        pool: &SqlitePool,
        new: NewReleaseNotification,
        now: DateTime<Utc>,
    ) -> AppResult<ReleaseNotification> {
        let now = now.naive_utc();
        let channels_json = serde_json::to_string(&new.channels)?;
        let metadata_json = serde_json::to_string(&new.metadata)?;
        let preferences_json = serde_json::to_string(&new.user_preferences)?;

        sqlx::query(
            r#"
            INSERT INTO release_notifications (
                id,
                user_id,
                event_id,
                release_kind,
                subject_kind,
                subject_id,
                title,
                message,
                scheduled_time,
                sent_at,
                status,
                channels_json,
                metadata_json,
                preferences_json,
                delivery_attempts_json,
                claimed_at,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 'scheduled', ?, ?, ?, '[]', NULL, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                event_id = excluded.event_id,
                title = excluded.title,
                message = excluded.message,
                scheduled_time = excluded.scheduled_time,
                channels_json = excluded.channels_json,
                metadata_json = excluded.metadata_json,
                preferences_json = excluded.preferences_json,
                status = 'scheduled',
                sent_at = NULL,
                claimed_at = NULL,
                updated_at = excluded.updated_at
            WHERE release_notifications.status <> 'sent'
            "#,
        )
        .bind(&new.id)
        .bind(&new.user_id)
        .bind(&new.event_id)
        .bind(new.release_kind.as_str())
        .bind(new.subject_kind.as_str())
        .bind(&new.subject_id)
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.scheduled_time.naive_utc())
        .bind(channels_json)
        .bind(metadata_json)
        .bind(preferences_json)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Self::find_by_id(pool, &new.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Release notification {}", new.id)))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<ReleaseNotification>> {
        let sql = format!("SELECT {COLUMNS} FROM release_notifications WHERE id = ?");
        let row = sqlx::query_as::<_, ReleaseNotificationRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        row.map(ReleaseNotification::try_from).transpose()
    }

    /// Select up to `limit` due, unclaimed `scheduled` rows, oldest due first.
    ///
    /// Rows are returned undecoded so that a single corrupt record can be
    /// failed individually by the caller instead of aborting the whole batch.
    pub async fn find_due(
        pool: &SqlitePool,
        now: DateTime<Utc>,
        claim_cutoff: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ReleaseNotificationRow>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM release_notifications
            WHERE status = 'scheduled'
              AND scheduled_time <= ?
              AND (claimed_at IS NULL OR claimed_at <= ?)
            ORDER BY scheduled_time ASC
            LIMIT ?
            "#
        );

        sqlx::query_as::<_, ReleaseNotificationRow>(&sql)
            .bind(now.naive_utc())
            .bind(claim_cutoff.naive_utc())
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Atomically claim a due entry for dispatch. Returns `false` when the entry
    /// is no longer `scheduled` or another worker holds a fresh claim.
    pub async fn claim(
        pool: &SqlitePool,
        id: &str,
        now: DateTime<Utc>,
        claim_cutoff: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE release_notifications
            SET claimed_at = ?, updated_at = ?
            WHERE id = ?
              AND status = 'scheduled'
              AND (claimed_at IS NULL OR claimed_at <= ?)
            "#,
        )
        .bind(now.naive_utc())
        .bind(now.naive_utc())
        .bind(id)
        .bind(claim_cutoff.naive_utc())
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Persist the outcome of a dispatch in a single write.
    ///
    /// `attempts` is the complete attempt log (previous attempts followed by the
    /// new ones). Returns `false` when the entry left `scheduled` meanwhile, in
    /// which case nothing is written.
    pub async fn complete_dispatch(
        pool: &SqlitePool,
        id: &str,
        status: NotificationStatus,
        sent_at: Option<DateTime<Utc>>,
        attempts: &[DeliveryAttempt],
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let attempts_json = serde_json::to_string(attempts)?;

        let result = sqlx::query(
            r#"
            UPDATE release_notifications
            SET status = ?,
                sent_at = ?,
                delivery_attempts_json = ?,
                claimed_at = NULL,
                updated_at = ?
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(status.as_str())
        .bind(sent_at.map(|t| t.naive_utc()))
        .bind(attempts_json)
        .bind(now.naive_utc())
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a `scheduled` entry to `failed`, appending `attempt` to its log.
    ///
    /// Works on the raw JSON column so it also applies to rows whose payload
    /// can no longer be decoded; an unreadable log is replaced by a log holding
    /// only this attempt.
    pub async fn mark_failed(
        pool: &SqlitePool,
        id: &str,
        attempt: &DeliveryAttempt,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let attempt_json = serde_json::to_string(attempt)?;

        let result = sqlx::query(
            r#"
            UPDATE release_notifications
            SET status = 'failed',
                sent_at = NULL,
                delivery_attempts_json = CASE
                    WHEN json_valid(delivery_attempts_json)
                         AND json_type(delivery_attempts_json) = 'array'
                    THEN json_insert(delivery_attempts_json, '$[#]', json(?))
                    ELSE json_array(json(?))
                END,
                claimed_at = NULL,
                updated_at = ?
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(&attempt_json)
        .bind(&attempt_json)
        .bind(now.naive_utc())
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancel a single entry. Returns `false` when it was not `scheduled`.
    pub async fn cancel(pool: &SqlitePool, id: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE release_notifications
            SET status = 'cancelled', updated_at = ?
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(now.naive_utc())
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancel every `scheduled` entry announcing the given subject.
    pub async fn cancel_by_subject(
        pool: &SqlitePool,
        subject_kind: SubjectKind,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE release_notifications
            SET status = 'cancelled', updated_at = ?
            WHERE subject_kind = ? AND subject_id = ? AND status = 'scheduled'
            "#,
        )
        .bind(now.naive_utc())
        .bind(subject_kind.as_str())
        .bind(subject_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Notifications of one user, newest first, with optional filters.
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        status: Option<NotificationStatus>,
        release_kind: Option<ReleaseKind>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ReleaseNotification>> {
        let status = status.map(|s| s.as_str());
        let release_kind = release_kind.map(|k| k.as_str());

        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM release_notifications
            WHERE user_id = ?
              AND (? IS NULL OR status = ?)
              AND (? IS NULL OR release_kind = ?)
            ORDER BY created_at DESC, id ASC
            LIMIT ?
            OFFSET ?
            "#
        );

        let rows = sqlx::query_as::<_, ReleaseNotificationRow>(&sql)
            .bind(user_id)
            .bind(status)
            .bind(status)
            .bind(release_kind)
            .bind(release_kind)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        rows.into_iter().map(ReleaseNotification::try_from).collect()
    }

    /// Due `scheduled` entries, oldest due first, including claimed ones.
    pub async fn list_pending(
        pool: &SqlitePool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<ReleaseNotification>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM release_notifications
            WHERE status = 'scheduled' AND scheduled_time <= ?
            ORDER BY scheduled_time ASC
            LIMIT ?
            "#
        );

        let rows = sqlx::query_as::<_, ReleaseNotificationRow>(&sql)
            .bind(now.naive_utc())
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

        rows.into_iter().map(ReleaseNotification::try_from).collect()
    }

    /// Delete `sent` and `cancelled` entries created before `cutoff`.
    /// `failed` entries are kept for auditing.
    pub async fn delete_terminal_before(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM release_notifications
            WHERE created_at < ?
              AND status IN ('sent', 'cancelled')
            "#,
        )
        .bind(cutoff.naive_utc())
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    pub async fn stats(pool: &SqlitePool, event_id: Option<&str>) -> AppResult<NotificationStats> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT status, release_kind, COUNT(*)
            FROM release_notifications
            WHERE (? IS NULL OR event_id = ?)
            GROUP BY status, release_kind
            "#,
        )
        .bind(event_id)
        .bind(event_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut stats = NotificationStats::default();
        for (status, kind, count) in rows {
            stats.total += count;
            match status.parse::<NotificationStatus>()? {
                NotificationStatus::Scheduled => stats.scheduled += count,
                NotificationStatus::Sent => stats.sent += count,
                NotificationStatus::Cancelled => stats.cancelled += count,
                NotificationStatus::Failed => stats.failed += count,
            }
            *stats.by_kind.entry(kind).or_insert(0) += count;
        }

        Ok(stats)
    }
}
