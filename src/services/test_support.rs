//! Shared fixtures for service tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{Channel, ReleaseNotification};
use crate::error::{AppError, AppResult};
use crate::services::calendar::CalendarSync;
use crate::services::channels::ChannelSender;
use crate::services::fanout::{MusicSubject, MusicType, ReleaseSubject};

/// How a stub sender behaves.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    Hang,
    Panic,
}

/// Sender that records every call and then behaves as configured.
pub struct StubSender {
    behavior: Behavior,
    calls: Mutex<Vec<(String, Channel)>>,
}

impl StubSender {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, Channel)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for StubSender {
    async fn send(&self, entry: &ReleaseNotification, channel: Channel) -> AppResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((entry.id.clone(), channel));

        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(AppError::channel(channel.as_str(), "gateway rejected message")),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
            Behavior::Panic => panic!("sender crashed"),
        }
    }
}

/// Calendar that records the users it was asked about, optionally failing.
pub struct StubCalendar {
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl StubCalendar {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarSync for StubCalendar {
    async fn add_release(
        &self,
        user_id: &str,
        _event_id: &str,
        _subject: &ReleaseSubject,
        _release_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.calls.lock().unwrap().push(user_id.to_string());
        if self.fail {
            return Err(AppError::channel("calendar", "calendar unavailable"));
        }
        Ok(())
    }
}

pub fn single(title: &str) -> ReleaseSubject {
    ReleaseSubject::Music(MusicSubject {
        id: format!("track-{}", title.to_lowercase()),
        title: title.to_string(),
        artist: "The Band".to_string(),
        music_type: MusicType::Single,
        artwork_url: None,
        spotify_url: Some(format!("https://open.spotify.com/track/{}", title)),
        youtube_url: None,
        is_exclusive: false,
    })
}

/// Noon UTC on a fixed day, away from any quiet-hour boundary used in tests.
pub fn noon() -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0).unwrap()
}
