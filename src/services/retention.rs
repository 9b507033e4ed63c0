//! Retention sweep for old terminal notifications.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::db::ReleaseNotificationRepository;
use crate::error::{AppError, AppResult};

pub struct RetentionSweeper;

impl RetentionSweeper {
    /// Delete `sent` and `cancelled` notifications created more than
    /// `days_old` days before `now`. Returns the number of deleted entries.
    pub async fn sweep(pool: &SqlitePool, days_old: i64, now: DateTime<Utc>) -> AppResult<u64> {
        if days_old < 0 {
            return Err(AppError::BadRequest(format!(
                "days_old must not be negative, got {}",
                days_old
            )));
        }

        let cutoff = now - Duration::days(days_old);
        let deleted = ReleaseNotificationRepository::delete_terminal_before(pool, cutoff).await?;

        if deleted > 0 {
            tracing::info!(
                "Retention sweep deleted {} release notification(s) created before {}",
                deleted,
                cutoff
            );
        }

        Ok(deleted)
    }
}
