use sqlx::SqlitePool;

use crate::db::models::InterestedUserRow;
use crate::error::{AppError, AppResult};

/// Read-only access to the catalog's attendance and preference tables.
pub struct InterestRepository;

impl InterestRepository {
    /// Distinct users marked `going` or `interested` for an event, with their
    /// stored release preferences (all columns `NULL` when they have none).
    pub async fn find_interested_users(
        pool: &SqlitePool,
        event_id: &str,
    ) -> AppResult<Vec<InterestedUserRow>> {
        sqlx::query_as::<_, InterestedUserRow>(
            r#"
            SELECT
                a.user_id AS user_id,
                p.enabled AS enabled,
                p.advance_notice_hours AS advance_notice_hours,
                p.quiet_start AS quiet_start,
                p.quiet_end AS quiet_end,
                p.channels_json AS channels_json,
                p.calendar_sync AS calendar_sync
            FROM (
                SELECT user_id, MIN(created_at) AS first_seen
                FROM event_attendance
                WHERE event_id = ? AND status IN ('going', 'interested')
                GROUP BY user_id
            ) a
            LEFT JOIN user_release_preferences p ON p.user_id = a.user_id
            ORDER BY a.first_seen ASC, a.user_id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
