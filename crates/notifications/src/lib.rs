//! Notification pipeline: the consumer side of the order events.
//!
//! The [`NotificationDispatcher`] receives bus events, works out which
//! channels apply (email, SMS, push, admin webhook), renders a message per
//! channel from [`Templates`], sends them concurrently through the
//! registered [`ChannelSender`]s and appends one [`NotificationHistoryEntry`]
//! per event. Redeliveries of an already recorded `event_id` are skipped.

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod senders;
pub mod template;

pub use channel::{Channel, ChannelSender, RenderedMessage};
pub use dispatcher::{DispatchOutcome, DispatcherConfig, NotificationDispatcher};
pub use error::{NotificationError, Result};
pub use history::{
    AttemptOutcome, ChannelAttempt, ClaimOutcome, HistoryStore, NotificationHistoryEntry,
};
pub use senders::{InMemoryChannelSender, LoggingChannelSender, SentMessage, WebhookSender};
pub use template::{Template, TemplateKind, Templates};
