//! In-process event bus.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::EventId;
use tokio::sync::{RwLock, mpsc};

use crate::publisher::{EventPublisher, EventStream, EventSubscriber};
use crate::{BusEvent, EventBusError};

struct Subscriber {
    topics: Vec<String>,
    sender: mpsc::UnboundedSender<BusEvent>,
}

/// Publishes kept for inspection by [`InMemoryEventBus::new`].
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

struct BusState {
    subscribers: Vec<Subscriber>,
    published: VecDeque<(String, BusEvent)>,
    log_capacity: usize,
}

impl BusState {
    fn log(&mut self, topic: &str, event: &BusEvent) {
        if self.log_capacity == 0 {
            return;
        }
        if self.published.len() == self.log_capacity {
            self.published.pop_front();
        }
        self.published.push_back((topic.to_string(), event.clone()));
    }

    fn prune_closed(&mut self) {
        self.subscribers.retain(|s| !s.sender.is_closed());
    }
}

/// An in-process bus that fans each published event out to every live
/// subscriber of its topic.
///
/// The most recent accepted publishes are also kept in a bounded log for
/// inspection, and [`redeliver`](Self::redeliver) replays a logged event to
/// reproduce the at-least-once behaviour of a real broker. Once the log is
/// full the oldest entry is dropped.
#[derive(Clone)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<BusState>>,
    fail_on_publish: Arc<AtomicBool>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl InMemoryEventBus {
    /// Creates an empty bus that logs up to [`DEFAULT_LOG_CAPACITY`]
    /// publishes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty bus that logs at most `capacity` publishes. Zero
    /// disables the log, and with it redelivery.
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(BusState {
                subscribers: Vec::new(),
                published: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
                log_capacity: capacity,
            })),
            fail_on_publish: Arc::new(AtomicBool::new(false)),
        }
    }

    /// When set, every publish fails with `PublishFailed`.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    /// Returns the logged publishes as `(topic, event)` pairs, oldest first.
    pub async fn published(&self) -> Vec<(String, BusEvent)> {
        self.state.read().await.published.iter().cloned().collect()
    }

    /// Returns the logged events of one topic, oldest first.
    pub async fn published_to(&self, topic: &str) -> Vec<BusEvent> {
        self.state
            .read()
            .await
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Returns the number of logged publishes.
    pub async fn published_count(&self) -> usize {
        self.state.read().await.published.len()
    }

    /// Delivers a previously published event to its subscribers again.
    ///
    /// Returns false if no event with that ID is in the log.
    pub async fn redeliver(&self, event_id: EventId) -> bool {
        let mut state = self.state.write().await;
        let found = state
            .published
            .iter()
            .find(|(_, event)| event.event_id() == event_id)
            .cloned();

        match found {
            Some((topic, event)) => {
                fan_out(&mut state.subscribers, &topic, &event);
                true
            }
            None => {
                state.prune_closed();
                false
            }
        }
    }

    /// Returns the number of subscribers that are still listening.
    pub async fn subscriber_count(&self) -> usize {
        self.state
            .read()
            .await
            .subscribers
            .iter()
            .filter(|s| !s.sender.is_closed())
            .count()
    }
}

fn fan_out(subscribers: &mut Vec<Subscriber>, topic: &str, event: &BusEvent) {
    subscribers.retain(|subscriber| {
        if !subscriber.topics.iter().any(|t| t == topic) {
            return !subscriber.sender.is_closed();
        }
        subscriber.sender.send(event.clone()).is_ok()
    });
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    #[tracing::instrument(skip(self, event), fields(event_id = %event.event_id()))]
    async fn publish(&self, topic: &str, event: &BusEvent) -> Result<(), EventBusError> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(EventBusError::PublishFailed {
                topic: topic.to_string(),
                reason: "injected publish failure".to_string(),
            });
        }

        let mut state = self.state.write().await;
        state.log(topic, event);
        fan_out(&mut state.subscribers, topic, event);

        tracing::debug!("event published in-process");
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryEventBus {
    async fn subscribe(&self, topics: &[&str]) -> Result<EventStream, EventBusError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.write().await;
        state.prune_closed();
        state.subscribers.push(Subscriber {
            topics: topics.iter().map(|t| t.to_string()).collect(),
            sender,
        });
        drop(state);

        let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        });
        Ok(Box::pin(stream))
    }
}
