//! Publish and subscribe seams.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{BusEvent, EventBusError};

/// A stream of events delivered to a subscriber.
pub type EventStream = Pin<Box<dyn Stream<Item = BusEvent> + Send>>;

/// Emits events onto named topics.
///
/// A successful return means the bus accepted the event; it says nothing
/// about delivery. Implementations make exactly one attempt and do not
/// retry, so callers decide how to treat a failure.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, event: &BusEvent) -> Result<(), EventBusError>;
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, topic: &str, event: &BusEvent) -> Result<(), EventBusError> {
        (**self).publish(topic, event).await
    }
}

/// Delivers events published on a set of topics.
///
/// Delivery is at-least-once: the same event (same `event_id`) may arrive
/// more than once and consumers must be idempotent.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn subscribe(&self, topics: &[&str]) -> Result<EventStream, EventBusError>;
}

#[async_trait]
impl<T: EventSubscriber + ?Sized> EventSubscriber for Arc<T> {
    async fn subscribe(&self, topics: &[&str]) -> Result<EventStream, EventBusError> {
        (**self).subscribe(topics).await
    }
}
