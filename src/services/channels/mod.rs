//! Channel senders: the boundary between the dispatcher and the transports
//! that actually deliver bytes (inbox table, push/email/SMS gateways).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::db::models::{Channel, ReleaseNotification};
use crate::error::AppResult;

pub mod gateway;
pub mod in_app;
pub mod render;

pub use gateway::GatewaySender;
pub use in_app::InAppSender;

/// Delivers one notification through one channel.
///
/// Implementations must not mutate the entry; the dispatcher records the
/// outcome. An `Err` is a failed attempt and its message lands in the audit log.
#[async_trait]
pub trait ChannelSender: Send + Sync + 'static {
    async fn send(&self, entry: &ReleaseNotification, channel: Channel) -> AppResult<()>;
}

/// One sender per channel.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` for `channel`, replacing any previous sender.
    pub fn register(mut self, channel: Channel, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(channel, sender);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(&channel).cloned()
    }

    /// Registered channels in canonical order.
    pub fn channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.senders.contains_key(c))
            .collect()
    }
}
