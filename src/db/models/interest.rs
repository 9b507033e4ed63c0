use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user who attends (or is interested in) an event, joined with their stored
/// release preferences when they have any.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InterestedUserRow {
    pub user_id: String,
    pub enabled: Option<bool>,
    pub advance_notice_hours: Option<i64>,
    pub quiet_start: Option<i64>,
    pub quiet_end: Option<i64>,
    pub channels_json: Option<String>,
    pub calendar_sync: Option<bool>,
}
