//! Delivery channels and the sender seam.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    Webhook,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Channel-ready content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    /// Email subject or push title; empty for SMS.
    pub subject: String,
    pub body: String,
}

/// Sends rendered messages over one channel.
///
/// Each send is an independent external call; a failure affects only that
/// send.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// The channel this sender delivers on.
    fn channel(&self) -> Channel;

    /// Delivers `message` to `recipient` (an address, phone number, device
    /// owner or URL, depending on the channel).
    async fn send(&self, recipient: &str, message: &RenderedMessage) -> Result<()>;
}

#[async_trait]
impl<T: ChannelSender + ?Sized> ChannelSender for Arc<T> {
    fn channel(&self) -> Channel {
        (**self).channel()
    }

    async fn send(&self, recipient: &str, message: &RenderedMessage) -> Result<()> {
        (**self).send(recipient, message).await
    }
}
