//! Calendar entries for music releases.
//!
//! Creating the calendar entry is best effort: the caller logs a failure and
//! keeps the scheduled notification.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::services::fanout::ReleaseSubject;

/// Puts a release into the user's calendar.
#[async_trait]
pub trait CalendarSync: Send + Sync + 'static {
    async fn add_release(
        &self,
        user_id: &str,
        event_id: &str,
        subject: &ReleaseSubject,
        release_at: DateTime<Utc>,
    ) -> AppResult<()>;
}

#[derive(Debug, Serialize)]
pub struct CalendarEventPayload {
    pub user_id: String,
    pub event_id: String,
    pub subject_kind: &'static str,
    pub subject_id: String,
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub url: Option<String>,
}

impl CalendarEventPayload {
    pub fn new(
        user_id: &str,
        event_id: &str,
        subject: &ReleaseSubject,
        release_at: DateTime<Utc>,
    ) -> Self {
        let (summary, description) = subject.text();
        Self {
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            subject_kind: subject.kind().as_str(),
            subject_id: subject.id().to_string(),
            summary,
            description,
            start: release_at,
            url: subject.metadata().external_url,
        }
    }
}

/// Posts calendar entries to an external calendar gateway as JSON.
#[derive(Clone)]
pub struct CalendarGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl CalendarGateway {
    pub fn new(endpoint: String, timeout: Duration) -> AppResult<Self> {
        url::Url::parse(&endpoint).map_err(|e| {
            AppError::Config(format!("Invalid calendar gateway URL {}: {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl CalendarSync for CalendarGateway {
    async fn add_release(
        &self,
        user_id: &str,
        event_id: &str,
        subject: &ReleaseSubject,
        release_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let payload = CalendarEventPayload::new(user_id, event_id, subject, release_at);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::channel("calendar", format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::channel(
                "calendar",
                format!("gateway error ({}): {}", status, error_text),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{noon, single};

    #[test]
    fn rejects_malformed_endpoint() {
        let err = CalendarGateway::new("calendar".to_string(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn payload_starts_at_the_release() {
        let payload = CalendarEventPayload::new("u1", "e1", &single("Song"), noon());
        assert_eq!(payload.start, noon());
        assert_eq!(payload.subject_kind, "music");
        assert_eq!(payload.summary, "New release: Song!");
        assert!(payload.url.is_some());
    }
}
