use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{render, ChannelSender};
use crate::db::models::{Channel, CreateInAppNotification, ReleaseNotification};
use crate::db::InAppNotificationRepository;
use crate::error::AppResult;

/// Writes the notification into the user's in-app inbox.
#[derive(Clone)]
pub struct InAppSender {
    pool: SqlitePool,
}

impl InAppSender {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelSender for InAppSender {
    async fn send(&self, entry: &ReleaseNotification, _channel: Channel) -> AppResult<()> {
        let metadata_json = serde_json::to_string(&render::release_link(entry))?;

        let row = InAppNotificationRepository::create(
            &self.pool,
            CreateInAppNotification {
                user_id: entry.user_id.clone(),
                release_notification_id: entry.id.clone(),
                title: entry.title.clone(),
                message: entry.message.clone(),
                metadata_json,
            },
        )
        .await?;

        tracing::debug!(
            "In-app notification {} stored for user {} (release notification {})",
            row.id,
            entry.user_id,
            entry.id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::models::{
        NotificationMetadata, NotificationStatus, ReleaseKind, SubjectKind, UserPreferences,
    };
    use crate::db::test_pool;

    #[tokio::test]
    async fn stores_inbox_row_for_user() {
        let pool = test_pool().await;
        let now = Utc::now();
        let entry = ReleaseNotification {
            id: "n1".to_string(),
            user_id: "u1".to_string(),
            event_id: "e1".to_string(),
            release_kind: ReleaseKind::AlbumRelease,
            subject_kind: SubjectKind::Music,
            subject_id: "album-1".to_string(),
            title: "New release: Album!".to_string(),
            message: "Band just released \"Album\". Listen now!".to_string(),
            scheduled_time: now,
            sent_at: None,
            status: NotificationStatus::Scheduled,
            channels: vec![Channel::InApp],
            metadata: NotificationMetadata::default(),
            user_preferences: UserPreferences {
                enabled: true,
                advance_notice_hours: 24,
                quiet_hours: None,
            },
            delivery_attempts: Vec::new(),
            claimed_at: None,
            created_at: now,
            updated_at: now,
        };

        InAppSender::new(pool.clone())
            .send(&entry, Channel::InApp)
            .await
            .unwrap();

        let inbox = InAppNotificationRepository::find_by_user_id(&pool, "u1", 10)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].release_notification_id, "n1");
        assert_eq!(inbox[0].kind, "release");
        assert!(!inbox[0].is_read);
        assert!(inbox[0].metadata_json.contains("album-1"));
    }
}
