use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{CreateInAppNotification, InAppNotification};
use crate::error::{AppError, AppResult};

pub struct InAppNotificationRepository;

impl InAppNotificationRepository {
    pub async fn create(
        pool: &SqlitePool,
        notification: CreateInAppNotification,
    ) -> AppResult<InAppNotification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, InAppNotification>(
            r#"
            INSERT INTO in_app_notifications (
                id, user_id, release_notification_id, kind,
                title, message, metadata_json, is_read, created_at
            )
            VALUES (?, ?, ?, 'release', ?, ?, ?, 0, ?)
            RETURNING
                id, user_id, release_notification_id, kind,
                title, message, metadata_json, is_read, created_at
            "#,
        )
        .bind(id)
        .bind(notification.user_id)
        .bind(notification.release_notification_id)
        .bind(notification.title)
        .bind(notification.message)
        .bind(notification.metadata_json)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Inbox of a user, newest first.
    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
    ) -> AppResult<Vec<InAppNotification>> {
        sqlx::query_as::<_, InAppNotification>(
            r#"
            SELECT
                id, user_id, release_notification_id, kind,
                title, message, metadata_json, is_read, created_at
            FROM in_app_notifications
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
