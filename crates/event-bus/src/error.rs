//! Event bus error types.

use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The bus could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The bus was reached but rejected the event.
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed { topic: String, reason: String },

    /// Subscribing to topics failed.
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed { topics: Vec<String>, reason: String },

    /// The event could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
