use std::time::Duration;

use async_trait::async_trait;

use super::{render, ChannelSender};
use crate::db::models::{Channel, ReleaseNotification};
use crate::error::{AppError, AppResult};

/// Hands push, email and SMS payloads to an external HTTP gateway.
///
/// The gateway owns transport concerns (device tokens, SMTP, carriers); this
/// sender only renders the payload for the channel and reports the HTTP outcome.
#[derive(Clone)]
pub struct GatewaySender {
    client: reqwest::Client,
    endpoint: String,
}

impl GatewaySender {
    pub fn new(endpoint: String, timeout: Duration) -> AppResult<Self> {
        url::Url::parse(&endpoint)
            .map_err(|e| AppError::Config(format!("Invalid gateway URL {}: {}", endpoint, e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    async fn post<T: serde::Serialize + Sync>(&self, channel: Channel, payload: &T) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::channel(channel.as_str(), format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::channel(
                channel.as_str(),
                format!("gateway error ({}): {}", status, error_text),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ChannelSender for GatewaySender {
    async fn send(&self, entry: &ReleaseNotification, channel: Channel) -> AppResult<()> {
        match channel {
            Channel::Push => self.post(channel, &render::push_payload(entry)).await,
            Channel::Email => self.post(channel, &render::email_payload(entry)).await,
            Channel::Sms => self.post(channel, &render::sms_payload(entry)).await,
            Channel::InApp => Err(AppError::channel(
                channel.as_str(),
                "in-app delivery is not handled by the HTTP gateway",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_endpoint() {
        let err = GatewaySender::new("not a url".to_string(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}
