//! Fan-out builder: turns a release into one scheduled notification per user.
//!
//! The builder never queries the catalog. Callers pass the catalog facts it
//! needs in a [`ReleaseSubject`]; everything else (kind, text, metadata, fire
//! time, id) is derived here.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::db::models::{
    Channel, NewReleaseNotification, NotificationMetadata, Priority, QuietHours, ReleaseKind,
    ReleaseNotification, SubjectKind, UserPreferences,
};
use crate::db::ReleaseNotificationRepository;
use crate::error::{AppError, AppResult};
use crate::services::calendar::CalendarSync;

/// Longest advance notice accepted (one year).
const MAX_ADVANCE_NOTICE_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicType {
    Album,
    Single,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicSubject {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub music_type: MusicType,
    pub artwork_url: Option<String>,
    pub spotify_url: Option<String>,
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub is_exclusive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchSubject {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub purchase_url: Option<String>,
    pub original_price: f64,
    pub sale_price: Option<f64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub limited_edition: bool,
    #[serde(default)]
    pub featured: bool,
}

/// Catalog item being released, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReleaseSubject {
    Music(MusicSubject),
    Merch(MerchSubject),
}

impl ReleaseSubject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            ReleaseSubject::Music(_) => SubjectKind::Music,
            ReleaseSubject::Merch(_) => SubjectKind::Merch,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ReleaseSubject::Music(m) => &m.id,
            ReleaseSubject::Merch(m) => &m.id,
        }
    }

    pub fn release_kind(&self) -> ReleaseKind {
        match self {
            ReleaseSubject::Music(m) => match m.music_type {
                MusicType::Album => ReleaseKind::AlbumRelease,
                MusicType::Single => ReleaseKind::SingleRelease,
                MusicType::Other => ReleaseKind::MusicRelease,
            },
            ReleaseSubject::Merch(_) => ReleaseKind::MerchRelease,
        }
    }

    /// Channels used when the user's preferences name none.
    pub fn default_channels(&self) -> Vec<Channel> {
        match self {
            ReleaseSubject::Music(_) => vec![Channel::InApp, Channel::Push],
            ReleaseSubject::Merch(_) => vec![Channel::InApp, Channel::Email],
        }
    }

    /// Display title and message, computed once at creation.
    pub fn text(&self) -> (String, String) {
        match self {
            ReleaseSubject::Music(m) => (
                format!("New release: {}!", m.title),
                format!("{} just released \"{}\". Listen now!", m.artist, m.title),
            ),
            ReleaseSubject::Merch(m) => {
                let hook = if m.discount_percentage > 0.0 {
                    format!("{}% off!", m.discount_percentage)
                } else {
                    "Don't miss it!".to_string()
                };
                (
                    format!("New merch available: {}!", m.name),
                    format!("{} is now available. {}", m.name, hook),
                )
            }
        }
    }

    pub fn metadata(&self) -> NotificationMetadata {
        match self {
            ReleaseSubject::Music(m) => {
                let platform = if m.spotify_url.is_some() {
                    "spotify"
                } else if m.youtube_url.is_some() {
                    "youtube"
                } else {
                    "other"
                };
                NotificationMetadata {
                    image_url: m.artwork_url.clone(),
                    external_url: m.spotify_url.clone().or_else(|| m.youtube_url.clone()),
                    price: None,
                    currency: None,
                    platform: Some(platform.to_string()),
                    priority: if m.is_exclusive {
                        Priority::High
                    } else {
                        Priority::Normal
                    },
                }
            }
            ReleaseSubject::Merch(m) => NotificationMetadata {
                image_url: m.image_url.clone(),
                external_url: m.purchase_url.clone(),
                price: Some(m.sale_price.unwrap_or(m.original_price)),
                currency: m.currency.clone(),
                platform: None,
                priority: if m.limited_edition {
                    Priority::Urgent
                } else if m.featured {
                    Priority::High
                } else {
                    Priority::Normal
                },
            },
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.id().trim().is_empty() {
            return Err(AppError::Validation("subject id is required".to_string()));
        }
        match self {
            ReleaseSubject::Music(m) => {
                if m.title.trim().is_empty() {
                    return Err(AppError::Validation("music title is required".to_string()));
                }
            }
            ReleaseSubject::Merch(m) => {
                if m.name.trim().is_empty() {
                    return Err(AppError::Validation("merch name is required".to_string()));
                }
                let price = m.sale_price.unwrap_or(m.original_price);
                if !price.is_finite() || price < 0.0 {
                    return Err(AppError::Validation(format!("invalid price: {}", price)));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHoursInput {
    pub start: i64,
    pub end: i64,
}

/// Preferences as received from a caller or the preference store. Every field
/// is optional; missing fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesInput {
    pub enabled: Option<bool>,
    pub advance_notice_hours: Option<i64>,
    pub quiet_hours: Option<QuietHoursInput>,
    pub channels: Option<Vec<String>>,
    /// Add music releases to the user's calendar. On unless set to `false`.
    pub calendar_sync: Option<bool>,
}

impl PreferencesInput {
    /// Fields set in `over` win over fields set in `self`.
    pub fn overlay(&self, over: &PreferencesInput) -> PreferencesInput {
        PreferencesInput {
            enabled: over.enabled.or(self.enabled),
            advance_notice_hours: over.advance_notice_hours.or(self.advance_notice_hours),
            quiet_hours: over.quiet_hours.or(self.quiet_hours),
            channels: over.channels.clone().or_else(|| self.channels.clone()),
            calendar_sync: over.calendar_sync.or(self.calendar_sync),
        }
    }
}

/// A user to notify, with whatever preferences are stored for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestedUser {
    pub user_id: String,
    #[serde(default)]
    pub preferences: PreferencesInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleFailure {
    pub user_id: String,
    pub error: String,
}

/// Result of scheduling a release for many users.
#[derive(Debug, Default, Serialize)]
pub struct BatchScheduleReport {
    pub scheduled: Vec<ReleaseNotification>,
    pub failures: Vec<ScheduleFailure>,
}

/// Deterministic entry id for a (user, subject, release kind) triple, so that
/// scheduling the same release twice for the same user updates in place.
pub fn entry_id(
    user_id: &str,
    subject_kind: SubjectKind,
    subject_id: &str,
    release_kind: ReleaseKind,
) -> String {
    let mut hasher = Sha256::new();
    for part in [
        user_id,
        subject_kind.as_str(),
        subject_id,
        release_kind.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

fn parse_channels(raw: &[String]) -> AppResult<Vec<Channel>> {
    let mut channels = Vec::with_capacity(raw.len());
    for name in raw {
        let channel = Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == name.trim())
            .ok_or_else(|| AppError::Validation(format!("unknown channel: {}", name)))?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    if channels.is_empty() {
        return Err(AppError::Validation(
            "channel list must not be empty".to_string(),
        ));
    }
    Ok(channels)
}

#[derive(Clone)]
pub struct FanoutBuilder {
    default_advance_notice_hours: i64,
    calendar: Option<Arc<dyn CalendarSync>>,
}

impl FanoutBuilder {
    pub fn new(default_advance_notice_hours: i64) -> Self {
        Self {
            default_advance_notice_hours,
            calendar: None,
        }
    }

    /// Add music releases to users' calendars after scheduling them.
    pub fn with_calendar(mut self, calendar: Arc<dyn CalendarSync>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Validate the inputs and build the record for one user. No I/O.
    pub fn build(
        &self,
        user_id: &str,
        event_id: &str,
        subject: &ReleaseSubject,
        release_at: DateTime<Utc>,
        preferences: &PreferencesInput,
    ) -> AppResult<NewReleaseNotification> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("user id is required".to_string()));
        }
        if event_id.trim().is_empty() {
            return Err(AppError::Validation("event id is required".to_string()));
        }
        subject.validate()?;

        let advance_notice_hours = preferences
            .advance_notice_hours
            .unwrap_or(self.default_advance_notice_hours);
        if !(0..=MAX_ADVANCE_NOTICE_HOURS).contains(&advance_notice_hours) {
            return Err(AppError::Validation(format!(
                "advance notice must be between 0 and {} hours, got {}",
                MAX_ADVANCE_NOTICE_HOURS, advance_notice_hours
            )));
        }

        let quiet_hours = match preferences.quiet_hours {
            Some(q) => {
                let hour = |h: i64| {
                    u8::try_from(h)
                        .ok()
                        .filter(|h| *h <= 23)
                        .ok_or_else(|| {
                            AppError::Validation(format!("quiet hour out of range 0..=23: {}", h))
                        })
                };
                Some(QuietHours {
                    start: hour(q.start)?,
                    end: hour(q.end)?,
                })
            }
            None => None,
        };

        let channels = match &preferences.channels {
            Some(raw) => parse_channels(raw)?,
            None => subject.default_channels(),
        };

        let scheduled_time = release_at
            .checked_sub_signed(Duration::hours(advance_notice_hours))
            .ok_or_else(|| AppError::Validation("release instant out of range".to_string()))?;

        let (title, message) = subject.text();
        let release_kind = subject.release_kind();

        Ok(NewReleaseNotification {
            id: entry_id(user_id, subject.kind(), subject.id(), release_kind),
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            release_kind,
            subject_kind: subject.kind(),
            subject_id: subject.id().to_string(),
            title,
            message,
            scheduled_time,
            channels,
            metadata: subject.metadata(),
            user_preferences: UserPreferences {
                enabled: preferences.enabled.unwrap_or(true),
                advance_notice_hours,
                quiet_hours,
            },
        })
    }

    /// Build and persist the notification for one user. Validation errors are
    /// returned to the caller and nothing is written.
    ///
    /// Music releases are then added to the user's calendar unless the user
    /// opted out; a calendar failure is logged and does not fail the call.
    pub async fn schedule(
        &self,
        pool: &SqlitePool,
        user_id: &str,
        event_id: &str,
        subject: &ReleaseSubject,
        release_at: DateTime<Utc>,
        preferences: &PreferencesInput,
        now: DateTime<Utc>,
    ) -> AppResult<ReleaseNotification> {
        let new = self.build(user_id, event_id, subject, release_at, preferences)?;
        let entry = ReleaseNotificationRepository::upsert(pool, new, now).await?;

        if entry.status.is_terminal() {
            tracing::info!(
                "Release notification {} for user {} is already {}, left unchanged",
                entry.id,
                entry.user_id,
                entry.status.as_str()
            );
            return Ok(entry);
        }

        tracing::info!(
            "Release notification {} scheduled for user {} ({} {}) at {}",
            entry.id,
            entry.user_id,
            entry.release_kind.as_str(),
            entry.subject_id,
            entry.scheduled_time
        );

        if let (ReleaseSubject::Music(_), Some(calendar)) = (subject, &self.calendar) {
            if preferences.calendar_sync != Some(false) {
                if let Err(e) = calendar
                    .add_release(user_id, event_id, subject, release_at)
                    .await
                {
                    tracing::warn!(
                        "Failed to add release {} to the calendar of user {}: {}",
                        subject.id(),
                        user_id,
                        e
                    );
                }
            }
        }

        Ok(entry)
    }

    /// Schedule for every user in `users`, continuing past per-user failures.
    ///
    /// Users are de-duplicated by id (first occurrence wins). `override_prefs`
    /// is laid over each user's own preferences.
    pub async fn schedule_batch(
        &self,
        pool: &SqlitePool,
        event_id: &str,
        subject: &ReleaseSubject,
        release_at: DateTime<Utc>,
        users: &[InterestedUser],
        override_prefs: &PreferencesInput,
        now: DateTime<Utc>,
    ) -> BatchScheduleReport {
        let mut report = BatchScheduleReport::default();
        let mut seen = HashSet::new();

        for user in users {
            if !seen.insert(user.user_id.as_str()) {
                continue;
            }

            let prefs = user.preferences.overlay(override_prefs);
            match self
                .schedule(pool, &user.user_id, event_id, subject, release_at, &prefs, now)
                .await
            {
                Ok(entry) => report.scheduled.push(entry),
                Err(e) => {
                    tracing::warn!(
                        "Failed to schedule release notification for user {}: {}",
                        user.user_id,
                        e
                    );
                    report.failures.push(ScheduleFailure {
                        user_id: user.user_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Scheduled {} release notification(s) for {} {} ({} failure(s))",
            report.scheduled.len(),
            subject.kind().as_str(),
            subject.id(),
            report.failures.len()
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NotificationStatus;
    use crate::db::test_pool;
    use crate::services::test_support::{noon, single, StubCalendar};

    fn hoodie() -> ReleaseSubject {
        ReleaseSubject::Merch(MerchSubject {
            id: "hoodie-1".to_string(),
            name: "Tour Hoodie".to_string(),
            image_url: Some("https://cdn.example.com/hoodie.png".to_string()),
            purchase_url: Some("https://shop.example.com/hoodie".to_string()),
            original_price: 900.0,
            sale_price: Some(720.0),
            currency: Some("MXN".to_string()),
            discount_percentage: 20.0,
            limited_edition: true,
            featured: true,
        })
    }

    #[test]
    fn fire_time_subtracts_advance_notice() {
        let builder = FanoutBuilder::new(24);
        let release = noon();

        let entry = builder
            .build("u1", "e1", &single("Song"), release, &PreferencesInput::default())
            .unwrap();
        assert_eq!(entry.scheduled_time, release - Duration::hours(24));
        assert_eq!(entry.user_preferences.advance_notice_hours, 24);
        assert!(entry.user_preferences.enabled);

        let prefs = PreferencesInput {
            advance_notice_hours: Some(2),
            ..Default::default()
        };
        let entry = builder
            .build("u1", "e1", &single("Song"), release, &prefs)
            .unwrap();
        assert_eq!(entry.scheduled_time, release - Duration::hours(2));
    }

    #[test]
    fn release_too_early_to_subtract_the_lead_is_rejected() {
        let release: DateTime<Utc> = serde_json::from_str("\"-262143-01-01T00:00:00Z\"").unwrap();
        let result = FanoutBuilder::new(24).build(
            "u1",
            "e1",
            &single("Song"),
            release,
            &PreferencesInput::default(),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = FanoutBuilder::new(24).build(
            "u1",
            "e1",
            &single("Song"),
            DateTime::<Utc>::MIN_UTC,
            &PreferencesInput::default(),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn music_subject_derivations() {
        let entry = FanoutBuilder::new(24)
            .build("u1", "e1", &single("Song"), noon(), &PreferencesInput::default())
            .unwrap();

        assert_eq!(entry.release_kind, ReleaseKind::SingleRelease);
        assert_eq!(entry.subject_kind, SubjectKind::Music);
        assert_eq!(entry.title, "New release: Song!");
        assert_eq!(entry.message, "The Band just released \"Song\". Listen now!");
        assert_eq!(entry.channels, vec![Channel::InApp, Channel::Push]);
        assert_eq!(entry.metadata.platform.as_deref(), Some("spotify"));
        assert_eq!(entry.metadata.priority, Priority::Normal);
    }

    #[test]
    fn merch_subject_derivations() {
        let entry = FanoutBuilder::new(24)
            .build("u1", "e1", &hoodie(), noon(), &PreferencesInput::default())
            .unwrap();

        assert_eq!(entry.release_kind, ReleaseKind::MerchRelease);
        assert_eq!(entry.title, "New merch available: Tour Hoodie!");
        assert_eq!(entry.message, "Tour Hoodie is now available. 20% off!");
        assert_eq!(entry.channels, vec![Channel::InApp, Channel::Email]);
        assert_eq!(entry.metadata.price, Some(720.0));
        assert_eq!(entry.metadata.priority, Priority::Urgent);
    }

    #[test]
    fn album_and_other_music_kinds() {
        let mut subject = single("Record");
        if let ReleaseSubject::Music(m) = &mut subject {
            m.music_type = MusicType::Album;
        }
        assert_eq!(subject.release_kind(), ReleaseKind::AlbumRelease);

        if let ReleaseSubject::Music(m) = &mut subject {
            m.music_type = MusicType::Other;
        }
        assert_eq!(subject.release_kind(), ReleaseKind::MusicRelease);
    }

    #[test]
    fn entry_id_is_stable_per_user_and_subject() {
        let a = entry_id("u1", SubjectKind::Music, "m1", ReleaseKind::SingleRelease);
        let b = entry_id("u1", SubjectKind::Music, "m1", ReleaseKind::SingleRelease);
        let c = entry_id("u2", SubjectKind::Music, "m1", ReleaseKind::SingleRelease);
        // Field boundaries matter: ("u1m", "1") must not collide with ("u1", "m1").
        let d = entry_id("u1m", SubjectKind::Music, "1", ReleaseKind::SingleRelease);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn invalid_preferences_are_rejected() {
        let builder = FanoutBuilder::new(24);
        let subject = single("Song");

        let cases = [
            PreferencesInput {
                quiet_hours: Some(QuietHoursInput { start: 22, end: 24 }),
                ..Default::default()
            },
            PreferencesInput {
                quiet_hours: Some(QuietHoursInput { start: -1, end: 6 }),
                ..Default::default()
            },
            PreferencesInput {
                advance_notice_hours: Some(-3),
                ..Default::default()
            },
            PreferencesInput {
                channels: Some(vec![]),
                ..Default::default()
            },
            PreferencesInput {
                channels: Some(vec!["fax".to_string()]),
                ..Default::default()
            },
        ];

        for prefs in cases {
            let result = builder.build("u1", "e1", &subject, noon(), &prefs);
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "expected validation error for {:?}",
                prefs
            );
        }

        assert!(matches!(
            builder.build("", "e1", &subject, noon(), &PreferencesInput::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn explicit_channels_are_deduplicated_in_order() {
        let prefs = PreferencesInput {
            channels: Some(vec![
                "email".to_string(),
                "sms".to_string(),
                "email".to_string(),
            ]),
            ..Default::default()
        };
        let entry = FanoutBuilder::new(24)
            .build("u1", "e1", &single("Song"), noon(), &prefs)
            .unwrap();
        assert_eq!(entry.channels, vec![Channel::Email, Channel::Sms]);
    }

    #[test]
    fn overlay_prefers_override_fields() {
        let stored = PreferencesInput {
            enabled: Some(false),
            advance_notice_hours: Some(48),
            quiet_hours: None,
            channels: Some(vec!["push".to_string()]),
            calendar_sync: Some(false),
        };
        let over = PreferencesInput {
            advance_notice_hours: Some(1),
            ..Default::default()
        };
        let merged = stored.overlay(&over);
        assert_eq!(merged.enabled, Some(false));
        assert_eq!(merged.advance_notice_hours, Some(1));
        assert_eq!(merged.channels, Some(vec!["push".to_string()]));
        assert_eq!(merged.calendar_sync, Some(false));
    }

    #[tokio::test]
    async fn batch_continues_past_failures_and_deduplicates_users() {
        let pool = test_pool().await;
        let builder = FanoutBuilder::new(24);
        let users = vec![
            InterestedUser {
                user_id: "u1".to_string(),
                preferences: PreferencesInput::default(),
            },
            InterestedUser {
                user_id: "u2".to_string(),
                preferences: PreferencesInput {
                    quiet_hours: Some(QuietHoursInput { start: 30, end: 2 }),
                    ..Default::default()
                },
            },
            InterestedUser {
                user_id: "u3".to_string(),
                preferences: PreferencesInput {
                    advance_notice_hours: Some(6),
                    ..Default::default()
                },
            },
            InterestedUser {
                user_id: "u1".to_string(),
                preferences: PreferencesInput::default(),
            },
        ];

        let report = builder
            .schedule_batch(
                &pool,
                "e1",
                &single("Song"),
                noon(),
                &users,
                &PreferencesInput::default(),
                noon() - Duration::days(3),
            )
            .await;

        assert_eq!(report.scheduled.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, "u2");
        assert!(report
            .scheduled
            .iter()
            .all(|e| e.status == NotificationStatus::Scheduled));

        let u3 = report
            .scheduled
            .iter()
            .find(|e| e.user_id == "u3")
            .unwrap();
        assert_eq!(u3.scheduled_time, noon() - Duration::hours(6));

        let stored = ReleaseNotificationRepository::list_for_user(&pool, "u2", None, None, 10, 0)
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn rescheduling_same_release_updates_in_place() {
        let pool = test_pool().await;
        let builder = FanoutBuilder::new(24);
        let created = noon() - Duration::days(3);

        let first = builder
            .schedule(&pool, "u1", "e1", &single("Song"), noon(), &PreferencesInput::default(), created)
            .await
            .unwrap();
        let moved = noon() + Duration::days(1);
        let second = builder
            .schedule(&pool, "u1", "e1", &single("Song"), moved, &PreferencesInput::default(), created)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.scheduled_time, moved - Duration::hours(24));
        let all = ReleaseNotificationRepository::list_for_user(&pool, "u1", None, None, 10, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn music_releases_go_to_the_calendar_unless_opted_out() {
        let pool = test_pool().await;
        let calendar = StubCalendar::new(false);
        let builder = FanoutBuilder::new(24).with_calendar(calendar.clone());
        let created = noon() - Duration::days(3);

        builder
            .schedule(&pool, "u1", "e1", &single("Song"), noon(), &PreferencesInput::default(), created)
            .await
            .unwrap();
        let opted_out = PreferencesInput {
            calendar_sync: Some(false),
            ..Default::default()
        };
        builder
            .schedule(&pool, "u2", "e1", &single("Song"), noon(), &opted_out, created)
            .await
            .unwrap();
        builder
            .schedule(&pool, "u3", "e1", &hoodie(), noon(), &PreferencesInput::default(), created)
            .await
            .unwrap();

        assert_eq!(calendar.calls(), vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn calendar_failure_keeps_the_notification() {
        let pool = test_pool().await;
        let calendar = StubCalendar::new(true);
        let builder = FanoutBuilder::new(24).with_calendar(calendar.clone());

        let entry = builder
            .schedule(
                &pool,
                "u1",
                "e1",
                &single("Song"),
                noon(),
                &PreferencesInput::default(),
                noon() - Duration::days(3),
            )
            .await
            .unwrap();

        assert_eq!(entry.status, NotificationStatus::Scheduled);
        assert_eq!(calendar.calls().len(), 1);
        assert!(ReleaseNotificationRepository::find_by_id(&pool, &entry.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn sent_entry_is_not_rescheduled_or_synced_again() {
        let pool = test_pool().await;
        let calendar = StubCalendar::new(false);
        let builder = FanoutBuilder::new(24).with_calendar(calendar.clone());
        let created = noon() - Duration::days(3);

        let entry = builder
            .schedule(&pool, "u1", "e1", &single("Song"), noon(), &PreferencesInput::default(), created)
            .await
            .unwrap();
        assert!(ReleaseNotificationRepository::complete_dispatch(
            &pool,
            &entry.id,
            NotificationStatus::Sent,
            Some(noon()),
            &[],
            noon(),
        )
        .await
        .unwrap());

        let again = builder
            .schedule(
                &pool,
                "u1",
                "e1",
                &single("Song"),
                noon() + Duration::days(1),
                &PreferencesInput::default(),
                noon(),
            )
            .await
            .unwrap();

        assert_eq!(again.status, NotificationStatus::Sent);
        assert_eq!(again.scheduled_time, entry.scheduled_time);
        assert_eq!(calendar.calls().len(), 1);
    }
}
