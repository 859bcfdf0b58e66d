//! Notification error types.

use thiserror::Error;

use crate::{Channel, TemplateKind};

/// Errors that can occur while dispatching notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Reading or writing the delivery history failed.
    #[error("History store error: {0}")]
    History(#[from] state_store::StateStoreError),

    /// A channel provider rejected or failed a send.
    #[error("{channel} send failed: {reason}")]
    Send { channel: Channel, reason: String },

    /// No template exists for a channel.
    #[error("No {channel} template for {kind}")]
    TemplateMissing { kind: TemplateKind, channel: Channel },

    /// Subscribing to the bus failed.
    #[error("Subscription error: {0}")]
    Subscription(#[from] event_bus::EventBusError),
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;
