//! Channel sender implementations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

use crate::channel::{Channel, ChannelSender, RenderedMessage};
use crate::{NotificationError, Result};

/// A message accepted by an [`InMemoryChannelSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: String,
    pub message: RenderedMessage,
}

/// Records sends instead of delivering them, with failure and latency
/// injection.
#[derive(Clone)]
pub struct InMemoryChannelSender {
    channel: Channel,
    sent: Arc<RwLock<Vec<SentMessage>>>,
    fail: Arc<AtomicBool>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl InMemoryChannelSender {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            sent: Arc::default(),
            fail: Arc::default(),
            delay: Arc::default(),
        }
    }

    /// Makes every send fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Delays every send.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// Returns the messages accepted so far.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }
}

#[async_trait]
impl ChannelSender for InMemoryChannelSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &str, message: &RenderedMessage) -> Result<()> {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Send {
                channel: self.channel,
                reason: "injected failure".to_string(),
            });
        }

        self.sent.write().await.push(SentMessage {
            recipient: recipient.to_string(),
            message: message.clone(),
        });
        Ok(())
    }
}

/// Writes each message to the log. Stands in for a provider integration.
#[derive(Debug, Clone, Copy)]
pub struct LoggingChannelSender {
    channel: Channel,
}

impl LoggingChannelSender {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelSender for LoggingChannelSender {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, recipient: &str, message: &RenderedMessage) -> Result<()> {
        tracing::info!(
            channel = %self.channel,
            recipient,
            subject = %message.subject,
            body = %message.body,
            "notification delivered"
        );
        Ok(())
    }
}

const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts `{subject, body}` as JSON to the recipient URL.
#[derive(Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    async fn send(&self, recipient: &str, message: &RenderedMessage) -> Result<()> {
        let send_error = |reason: String| NotificationError::Send {
            channel: Channel::Webhook,
            reason,
        };

        let response = self
            .client
            .post(recipient)
            .json(&json!({ "subject": message.subject, "body": message.body }))
            .send()
            .await
            .map_err(|e| send_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(send_error(format!("webhook returned {status}")));
        }
        Ok(())
    }
}
