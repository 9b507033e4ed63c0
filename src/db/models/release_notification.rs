use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Lifecycle of a release notification.
///
/// `Scheduled` is the only non-terminal state. The dispatcher moves an entry to
/// `Sent` or `Failed`, an explicit cancellation moves it to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Scheduled,
    Sent,
    Cancelled,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Scheduled => "scheduled",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Cancelled => "cancelled",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, NotificationStatus::Scheduled)
    }
}

impl FromStr for NotificationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(NotificationStatus::Scheduled),
            "sent" => Ok(NotificationStatus::Sent),
            "cancelled" => Ok(NotificationStatus::Cancelled),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(AppError::BadRequest(format!("Invalid status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    MusicRelease,
    MerchRelease,
    AlbumRelease,
    SingleRelease,
    BundleRelease,
}

impl ReleaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseKind::MusicRelease => "music_release",
            ReleaseKind::MerchRelease => "merch_release",
            ReleaseKind::AlbumRelease => "album_release",
            ReleaseKind::SingleRelease => "single_release",
            ReleaseKind::BundleRelease => "bundle_release",
        }
    }
}

impl FromStr for ReleaseKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "music_release" => Ok(ReleaseKind::MusicRelease),
            "merch_release" => Ok(ReleaseKind::MerchRelease),
            "album_release" => Ok(ReleaseKind::AlbumRelease),
            "single_release" => Ok(ReleaseKind::SingleRelease),
            "bundle_release" => Ok(ReleaseKind::BundleRelease),
            other => Err(AppError::BadRequest(format!(
                "Invalid release kind: {}",
                other
            ))),
        }
    }
}

/// Catalog family a notification's subject belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Music,
    Merch,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectKind::Music => "music",
            SubjectKind::Merch => "merch",
        }
    }
}

impl FromStr for SubjectKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "music" => Ok(SubjectKind::Music),
            "merch" => Ok(SubjectKind::Merch),
            other => Err(AppError::BadRequest(format!(
                "Invalid subject kind: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Push,
    Email,
    Sms,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::InApp, Channel::Push, Channel::Email, Channel::Sms];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Push => "push",
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Daily window (UTC hours, `0..=23`) during which a notification is held back.
/// `start >= end` means the window wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: u8,
    pub end: u8,
}

impl QuietHours {
    pub fn contains(&self, hour: u32) -> bool {
        let (start, end) = (u32::from(self.start), u32::from(self.end));
        if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }
}

/// Snapshot of the user's notification preferences taken when the entry was
/// created. Later profile edits do not reach existing entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub enabled: bool,
    pub advance_notice_hours: i64,
    pub quiet_hours: Option<QuietHours>,
}

/// Display and linking hints handed to channel senders. Never consulted by the
/// scheduling logic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationMetadata {
    pub image_url: Option<String>,
    pub external_url: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub platform: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

/// One channel attempt. `channel` is `None` when the entry failed before any
/// channel could be tried (e.g. its stored record could not be processed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub timestamp: DateTime<Utc>,
    pub channel: Option<Channel>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Raw `release_notifications` row. Structured columns are JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct ReleaseNotificationRow {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub release_kind: String,
    pub subject_kind: String,
    pub subject_id: String,
    pub title: String,
    pub message: String,
    pub scheduled_time: NaiveDateTime,
    pub sent_at: Option<NaiveDateTime>,
    pub status: String,
    pub channels_json: String,
    pub metadata_json: String,
    pub preferences_json: String,
    pub delivery_attempts_json: String,
    pub claimed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A single user's announcement of a single release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseNotification {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub release_kind: ReleaseKind,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub title: String,
    pub message: String,
    pub scheduled_time: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: NotificationStatus,
    pub channels: Vec<Channel>,
    pub metadata: NotificationMetadata,
    pub user_preferences: UserPreferences,
    pub delivery_attempts: Vec<DeliveryAttempt>,
    #[serde(skip)]
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ReleaseNotificationRow> for ReleaseNotification {
    type Error = AppError;

    fn try_from(row: ReleaseNotificationRow) -> Result<Self, Self::Error> {
        Ok(ReleaseNotification {
            release_kind: row.release_kind.parse()?,
            subject_kind: row.subject_kind.parse()?,
            status: row.status.parse()?,
            channels: serde_json::from_str(&row.channels_json)?,
            metadata: serde_json::from_str(&row.metadata_json)?,
            user_preferences: serde_json::from_str(&row.preferences_json)?,
            delivery_attempts: serde_json::from_str(&row.delivery_attempts_json)?,
            scheduled_time: row.scheduled_time.and_utc(),
            sent_at: row.sent_at.map(|t| t.and_utc()),
            claimed_at: row.claimed_at.map(|t| t.and_utc()),
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
            id: row.id,
            user_id: row.user_id,
            event_id: row.event_id,
            subject_id: row.subject_id,
            title: row.title,
            message: row.message,
        })
    }
}

/// Data required to persist a freshly built notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReleaseNotification {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub release_kind: ReleaseKind,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub title: String,
    pub message: String,
    pub scheduled_time: DateTime<Utc>,
    pub channels: Vec<Channel>,
    pub metadata: NotificationMetadata,
    pub user_preferences: UserPreferences,
}

/// Aggregate counts over release notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationStats {
    pub total: i64,
    pub scheduled: i64,
    pub sent: i64,
    pub cancelled: i64,
    pub failed: i64,
    pub by_kind: std::collections::HashMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_hours_same_day_window() {
        let quiet = QuietHours { start: 9, end: 17 };
        assert!(quiet.contains(9));
        assert!(quiet.contains(12));
        assert!(!quiet.contains(17));
        assert!(!quiet.contains(20));
        assert!(!quiet.contains(3));
    }

    #[test]
    fn quiet_hours_wrapping_midnight() {
        let quiet = QuietHours { start: 22, end: 6 };
        assert!(quiet.contains(22));
        assert!(quiet.contains(23));
        assert!(quiet.contains(0));
        assert!(quiet.contains(5));
        assert!(!quiet.contains(6));
        assert!(!quiet.contains(10));
    }

    #[test]
    fn quiet_hours_equal_bounds_cover_whole_day() {
        let quiet = QuietHours { start: 8, end: 8 };
        assert!((0..24).all(|h| quiet.contains(h)));
    }

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(
            serde_json::to_string(&vec![Channel::InApp, Channel::Sms]).unwrap(),
            r#"["in_app","sms"]"#
        );
        assert_eq!(
            "album_release".parse::<ReleaseKind>().unwrap(),
            ReleaseKind::AlbumRelease
        );
        assert!("archived".parse::<NotificationStatus>().is_err());
    }

    #[test]
    fn row_with_corrupt_json_fails_conversion() {
        let now = Utc::now().naive_utc();
        let row = ReleaseNotificationRow {
            id: "n1".to_string(),
            user_id: "u1".to_string(),
            event_id: "e1".to_string(),
            release_kind: "music_release".to_string(),
            subject_kind: "music".to_string(),
            subject_id: "m1".to_string(),
            title: "t".to_string(),
            message: "m".to_string(),
            scheduled_time: now,
            sent_at: None,
            status: "scheduled".to_string(),
            channels_json: "not json".to_string(),
            metadata_json: "{}".to_string(),
            preferences_json: r#"{"enabled":true,"advance_notice_hours":24,"quiet_hours":null}"#
                .to_string(),
            delivery_attempts_json: "[]".to_string(),
            claimed_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            ReleaseNotification::try_from(row),
            Err(AppError::Serialization(_))
        ));
    }
}
