//! Dispatcher: delivers one claimed notification through its channels and
//! records the outcome.

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use sqlx::SqlitePool;

use crate::db::models::{Channel, DeliveryAttempt, NotificationStatus, ReleaseNotification};
use crate::db::ReleaseNotificationRepository;
use crate::error::AppResult;
use crate::services::channels::ChannelRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At least one channel succeeded.
    Sent,
    /// Every channel failed.
    Failed,
    /// The entry left `scheduled` (cancelled) while the sends were in flight.
    /// The sends happened but nothing was written.
    Superseded,
}

pub struct Dispatcher {
    pool: SqlitePool,
    registry: ChannelRegistry,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(pool: SqlitePool, registry: ChannelRegistry, send_timeout: Duration) -> Self {
        Self {
            pool,
            registry,
            send_timeout,
        }
    }

    /// Attempt every channel of `entry` once and persist the result.
    ///
    /// Channel failures never surface as `Err`; they are recorded as failed
    /// attempts. `Err` is reserved for store failures. `sent_at` is the instant
    /// the last channel attempt finished.
    pub async fn dispatch(&self, entry: &ReleaseNotification) -> AppResult<DispatchOutcome> {
        let mut channels: Vec<Channel> = Vec::with_capacity(entry.channels.len());
        for channel in &entry.channels {
            if !channels.contains(channel) {
                channels.push(*channel);
            }
        }

        let new_attempts = if channels.is_empty() {
            vec![DeliveryAttempt {
                timestamp: Utc::now(),
                channel: None,
                success: false,
                error: Some("no delivery channels configured".to_string()),
            }]
        } else {
            join_all(channels.into_iter().map(|c| self.attempt(entry, c))).await
        };

        let completed_at = Utc::now();
        let any_success = new_attempts.iter().any(|a| a.success);
        let (status, sent_at) = if any_success {
            (NotificationStatus::Sent, Some(completed_at))
        } else {
            (NotificationStatus::Failed, None)
        };

        let mut attempts = entry.delivery_attempts.clone();
        attempts.extend(new_attempts);

        let written = ReleaseNotificationRepository::complete_dispatch(
            &self.pool, &entry.id, status, sent_at, &attempts, completed_at,
        )
        .await?;

        if !written {
            tracing::warn!(
                "Release notification {} changed state during dispatch, outcome discarded",
                entry.id
            );
            return Ok(DispatchOutcome::Superseded);
        }

        if any_success {
            tracing::info!(
                "Release notification {} sent to user {}",
                entry.id,
                entry.user_id
            );
            Ok(DispatchOutcome::Sent)
        } else {
            tracing::warn!(
                "Release notification {} failed on every channel for user {}",
                entry.id,
                entry.user_id
            );
            Ok(DispatchOutcome::Failed)
        }
    }

    async fn attempt(&self, entry: &ReleaseNotification, channel: Channel) -> DeliveryAttempt {
        let result = match self.registry.get(channel) {
            None => Err(format!("no sender registered for channel {}", channel)),
            Some(sender) => {
                match tokio::time::timeout(self.send_timeout, sender.send(entry, channel)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "timed out after {}s",
                        self.send_timeout.as_secs_f64()
                    )),
                }
            }
        };

        if let Err(e) = &result {
            tracing::warn!(
                "Failed to deliver release notification {} via {}: {}",
                entry.id,
                channel,
                e
            );
        }

        DeliveryAttempt {
            timestamp: Utc::now(),
            channel: Some(channel),
            success: result.is_ok(),
            error: result.err(),
        }
    }
}
