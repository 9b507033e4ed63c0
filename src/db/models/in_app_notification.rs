use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Inbox row produced by the in-app channel.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InAppNotification {
    pub id: String,
    pub user_id: String,
    pub release_notification_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub metadata_json: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInAppNotification {
    pub user_id: String,
    pub release_notification_id: String,
    pub title: String,
    pub message: String,
    pub metadata_json: String,
}
