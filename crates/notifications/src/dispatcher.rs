//! Turns bus events into channel sends and history entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use event_bus::{BusEvent, EventStream, EventSubscriber, topics};
use futures_util::StreamExt;
use futures_util::future::join_all;
use serde_json::json;
use state_store::StateStore;
use tokio::task::{JoinHandle, JoinSet};

use crate::channel::{Channel, ChannelSender, RenderedMessage};
use crate::history::{
    AttemptOutcome, ChannelAttempt, ClaimOutcome, HistoryStore, NotificationHistoryEntry,
};
use crate::template::{TemplateKind, Templates};
use crate::{NotificationError, Result};

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on a single channel send.
    pub send_timeout: Duration,

    /// `inventory.updated` events alert only below this quantity.
    pub low_stock_threshold: i64,

    /// Recipient of low-stock emails.
    pub admin_email: String,

    /// Optional URL that also receives low-stock alerts.
    pub admin_webhook_url: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            low_stock_threshold: 10,
            admin_email: "admin@example.com".to_string(),
            admin_webhook_url: None,
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Channels were attempted and a history entry was written.
    Dispatched {
        history_id: String,
        attempts: Vec<ChannelAttempt>,
    },

    /// The event had already been dispatched; nothing was sent.
    Duplicate,

    /// Nothing to send for this event.
    Skipped(String),
}

/// One planned send.
struct Delivery {
    kind: TemplateKind,
    channel: Channel,
    recipient: String,
    message: Option<RenderedMessage>,
}

/// Everything derived from an event before any send happens.
struct Plan {
    deliveries: Vec<Delivery>,
    metadata: serde_json::Value,
}

/// Consumes bus events and notifies customers and administrators.
///
/// Each event is deduplicated on its `event_id` against the history store,
/// so redeliveries from the bus do not repeat sends.
pub struct NotificationDispatcher<S: StateStore> {
    history: HistoryStore<S>,
    senders: HashMap<Channel, Arc<dyn ChannelSender>>,
    templates: Templates,
    config: DispatcherConfig,
}

impl<S: StateStore + 'static> NotificationDispatcher<S> {
    /// Creates a dispatcher with default templates and no senders.
    pub fn new(store: S, config: DispatcherConfig) -> Self {
        Self {
            history: HistoryStore::new(store),
            senders: HashMap::new(),
            templates: Templates::default(),
            config,
        }
    }

    /// Registers the sender for its channel, replacing any previous one.
    pub fn with_sender(mut self, sender: impl ChannelSender + 'static) -> Self {
        self.senders.insert(sender.channel(), Arc::new(sender));
        self
    }

    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handles one delivery of an event.
    ///
    /// The event is claimed in the history store before any channel is
    /// tried, so overlapping deliveries of one event send once. Returns an
    /// error only if the history store could not be read or
    /// written; the caller should then let the bus redeliver. Channel
    /// failures are recorded in the history entry and do not fail the call.
    #[tracing::instrument(
        skip_all,
        fields(event_id = %event.event_id(), event_type = event.event_type())
    )]
    pub async fn handle(&self, event: &BusEvent) -> Result<DispatchOutcome> {
        let plan = match self.plan(event) {
            Ok(plan) => plan,
            Err(reason) => {
                tracing::debug!(%reason, "nothing to dispatch");
                return Ok(DispatchOutcome::Skipped(reason));
            }
        };

        let history_id = NotificationHistoryEntry::new_id();
        if let ClaimOutcome::AlreadyClaimed(existing) =
            self.history.claim(event.event_id(), &history_id).await?
        {
            metrics::counter!("notifications_duplicate_total").increment(1);
            tracing::info!(history_id = %existing, "event already dispatched, skipping");
            return Ok(DispatchOutcome::Duplicate);
        }

        let attempts = join_all(plan.deliveries.iter().map(|d| self.attempt(d))).await;

        let entry = NotificationHistoryEntry::new(
            history_id,
            event.event_id(),
            event.event_type(),
            event.entity_id(),
            attempts.clone(),
            plan.metadata,
        );
        self.history.write_entry(&entry).await?;

        let sent = attempts.iter().filter(|a| a.is_sent()).count();
        tracing::info!(
            history_id = %entry.id,
            sent,
            attempted = attempts.len(),
            "notifications dispatched"
        );
        Ok(DispatchOutcome::Dispatched {
            history_id: entry.id,
            attempts,
        })
    }

    /// Subscribes to every notification topic and dispatches in the
    /// background until the subscription ends.
    pub async fn start<B>(self: Arc<Self>, bus: &B) -> Result<JoinHandle<()>>
    where
        B: EventSubscriber + ?Sized,
    {
        let events = bus.subscribe(&topics::NOTIFICATION_TOPICS).await?;
        Ok(tokio::spawn(self.run(events)))
    }

    /// Handles every event from `events`, each on its own task. Returns once
    /// the stream ends and all in-flight events are done.
    pub async fn run(self: Arc<Self>, mut events: EventStream) {
        let mut in_flight = JoinSet::new();

        while let Some(event) = events.next().await {
            while in_flight.try_join_next().is_some() {}

            let dispatcher = self.clone();
            in_flight.spawn(async move {
                if let Err(e) = dispatcher.handle(&event).await {
                    tracing::error!(
                        event_id = %event.event_id(),
                        error = %e,
                        "dispatch failed"
                    );
                }
            });
        }

        while in_flight.join_next().await.is_some() {}
        tracing::info!("event stream closed, dispatcher stopped");
    }

    fn plan(&self, event: &BusEvent) -> std::result::Result<Plan, String> {
        let (kind, vars, metadata, recipients) = match event {
            BusEvent::OrderCreated(e) | BusEvent::OrderUpdated(e) | BusEvent::OrderCancelled(e) => {
                let kind = match event {
                    BusEvent::OrderCreated(_) => TemplateKind::OrderCreated,
                    _ => TemplateKind::OrderStatusChanged,
                };
                let total = format!("{:.2}", e.total_amount);
                let vars = HashMap::from([
                    ("order_id", e.order_id.to_string()),
                    ("customer_id", e.customer_id.to_string()),
                    ("total_amount", total),
                    ("status", e.status.to_string()),
                    ("reason", e.reason.clone().unwrap_or_default()),
                ]);
                let metadata = json!({
                    "total_amount": e.total_amount,
                    "status": e.status,
                });
                let recipients = customer_recipients(
                    e.data.customer_email.as_deref(),
                    e.data.customer_phone.as_deref(),
                    e.customer_id.as_str(),
                );
                (kind, vars, metadata, recipients)
            }
            BusEvent::PaymentProcessed(e) => {
                let vars = HashMap::from([
                    ("order_id", e.order_id.to_string()),
                    ("customer_id", e.customer_id.to_string()),
                    ("amount", format!("{:.2}", e.amount)),
                    ("payment_status", e.payment_status.clone()),
                ]);
                let metadata = json!({
                    "amount": e.amount,
                    "payment_status": e.payment_status,
                });
                let recipients = customer_recipients(
                    e.customer_email.as_deref(),
                    e.customer_phone.as_deref(),
                    e.customer_id.as_str(),
                );
                (TemplateKind::PaymentProcessed, vars, metadata, recipients)
            }
            BusEvent::InventoryUpdated(e) => {
                let threshold = self.config.low_stock_threshold;
                if e.available_quantity >= threshold {
                    return Err(format!(
                        "stock level {} is not below threshold {threshold}",
                        e.available_quantity
                    ));
                }

                let vars = HashMap::from([
                    ("product_id", e.product_id.clone()),
                    ("product_name", e.product_name.clone()),
                    ("available_quantity", e.available_quantity.to_string()),
                    ("threshold", threshold.to_string()),
                ]);
                let metadata = json!({
                    "product_id": e.product_id,
                    "available_quantity": e.available_quantity,
                    "threshold": threshold,
                });
                let mut recipients = vec![(Channel::Email, self.config.admin_email.clone())];
                if let Some(url) = &self.config.admin_webhook_url {
                    recipients.push((Channel::Webhook, url.clone()));
                }
                (TemplateKind::InventoryLow, vars, metadata, recipients)
            }
        };

        let deliveries: Vec<Delivery> = recipients
            .into_iter()
            .filter(|(_, recipient)| !recipient.trim().is_empty())
            .map(|(channel, recipient)| Delivery {
                kind,
                channel,
                recipient,
                message: self.templates.render(kind, channel, &vars),
            })
            .collect();

        if deliveries.is_empty() {
            return Err("no recipients".to_string());
        }

        Ok(Plan {
            deliveries,
            metadata,
        })
    }

    async fn attempt(&self, delivery: &Delivery) -> ChannelAttempt {
        let channel = delivery.channel;
        let result = self.send(delivery).await;

        let (outcome, error) = match result {
            Ok(()) => (AttemptOutcome::Sent, None),
            Err(SendFailure::TimedOut) => (
                AttemptOutcome::TimedOut,
                Some(format!(
                    "no response within {}ms",
                    self.config.send_timeout.as_millis()
                )),
            ),
            Err(SendFailure::Failed(e)) => (AttemptOutcome::Failed, Some(e.to_string())),
        };

        match outcome {
            AttemptOutcome::Sent => {
                metrics::counter!("notifications_sent_total", "channel" => channel.as_str())
                    .increment(1);
            }
            AttemptOutcome::Failed | AttemptOutcome::TimedOut => {
                metrics::counter!("notifications_failed_total", "channel" => channel.as_str())
                    .increment(1);
                tracing::warn!(
                    %channel,
                    recipient = %delivery.recipient,
                    error = error.as_deref().unwrap_or_default(),
                    "notification send failed"
                );
            }
        }

        ChannelAttempt {
            channel,
            recipient: delivery.recipient.clone(),
            outcome,
            error,
        }
    }

    async fn send(&self, delivery: &Delivery) -> std::result::Result<(), SendFailure> {
        let sender = self.senders.get(&delivery.channel).ok_or_else(|| {
            SendFailure::Failed(NotificationError::Send {
                channel: delivery.channel,
                reason: "no sender registered".to_string(),
            })
        })?;

        let message = delivery.message.as_ref().ok_or_else(|| {
            SendFailure::Failed(NotificationError::TemplateMissing {
                kind: delivery.kind,
                channel: delivery.channel,
            })
        })?;

        tokio::time::timeout(
            self.config.send_timeout,
            sender.send(&delivery.recipient, message),
        )
        .await
        .map_err(|_| SendFailure::TimedOut)?
        .map_err(SendFailure::Failed)
    }
}

enum SendFailure {
    TimedOut,
    Failed(NotificationError),
}

/// Customer channels in fixed order: email, SMS, push.
fn customer_recipients(
    email: Option<&str>,
    phone: Option<&str>,
    customer_id: &str,
) -> Vec<(Channel, String)> {
    [
        (Channel::Email, email),
        (Channel::Sms, phone),
        (Channel::Push, Some(customer_id)),
    ]
    .into_iter()
    .filter_map(|(channel, recipient)| recipient.map(|r| (channel, r.to_string())))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::senders::InMemoryChannelSender;
    use chrono::Utc;
    use common::EventId;
    use domain::{Money, NewOrder, Order};
    use event_bus::{InventoryUpdatedEvent, PaymentProcessedEvent, SCHEMA_VERSION};
    use state_store::InMemoryStateStore;

    struct Senders {
        email: InMemoryChannelSender,
        sms: InMemoryChannelSender,
        push: InMemoryChannelSender,
        webhook: InMemoryChannelSender,
    }

    fn setup(config: DispatcherConfig) -> (NotificationDispatcher<InMemoryStateStore>, Senders) {
        let senders = Senders {
            email: InMemoryChannelSender::new(Channel::Email),
            sms: InMemoryChannelSender::new(Channel::Sms),
            push: InMemoryChannelSender::new(Channel::Push),
            webhook: InMemoryChannelSender::new(Channel::Webhook),
        };
        let dispatcher = NotificationDispatcher::new(InMemoryStateStore::new(), config)
            .with_sender(senders.email.clone())
            .with_sender(senders.sms.clone())
            .with_sender(senders.push.clone())
            .with_sender(senders.webhook.clone());
        (dispatcher, senders)
    }

    fn order_event(email: Option<&str>, phone: Option<&str>) -> BusEvent {
        let mut request = NewOrder::new("c1").with_item("p1", 2, Money::from_cents(2999));
        if let Some(email) = email {
            request = request.customer_email(email);
        }
        if let Some(phone) = phone {
            request = request.customer_phone(phone);
        }
        BusEvent::order_created(&Order::place(request, Utc::now()).unwrap())
    }

    fn inventory_event(available_quantity: i64) -> BusEvent {
        BusEvent::InventoryUpdated(InventoryUpdatedEvent {
            schema_version: SCHEMA_VERSION,
            event_id: EventId::new(),
            product_id: "p1".to_string(),
            product_name: "Widget".to_string(),
            available_quantity,
            timestamp: Utc::now(),
        })
    }

    fn channels(outcome: &DispatchOutcome) -> Vec<Channel> {
        match outcome {
            DispatchOutcome::Dispatched { attempts, .. } => {
                attempts.iter().map(|a| a.channel).collect()
            }
            other => panic!("expected Dispatched, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn only_present_contacts_are_notified() {
        let (dispatcher, senders) = setup(DispatcherConfig::default());

        let outcome = dispatcher
            .handle(&order_event(None, Some("555-0100")))
            .await
            .unwrap();

        assert_eq!(channels(&outcome), vec![Channel::Sms, Channel::Push]);
        assert_eq!(senders.email.sent_count().await, 0);

        let sms = senders.sms.sent().await;
        assert_eq!(sms[0].recipient, "555-0100");
        assert!(sms[0].message.body.contains("$59.98"), "{}", sms[0].message.body);
        assert_eq!(senders.push.sent().await[0].recipient, "c1");
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_others() {
        let (dispatcher, senders) = setup(DispatcherConfig::default());
        senders.email.set_fail(true);

        let outcome = dispatcher
            .handle(&order_event(Some("c1@example.com"), Some("555-0100")))
            .await
            .unwrap();

        let DispatchOutcome::Dispatched { attempts, history_id } = outcome else {
            panic!("expected Dispatched");
        };
        assert_eq!(attempts[0].outcome, AttemptOutcome::Failed);
        assert!(attempts[1].is_sent());
        assert!(attempts[2].is_sent());

        let entry = dispatcher.history().get(&history_id).await.unwrap().unwrap();
        assert_eq!(entry.channels, attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_channel_times_out() {
        let (dispatcher, senders) = setup(DispatcherConfig {
            send_timeout: Duration::from_millis(100),
            ..DispatcherConfig::default()
        });
        senders.push.set_delay(Some(Duration::from_secs(30))).await;

        let outcome = dispatcher.handle(&order_event(Some("c1@example.com"), None)).await.unwrap();

        let DispatchOutcome::Dispatched { attempts, .. } = outcome else {
            panic!("expected Dispatched");
        };
        assert!(attempts[0].is_sent());
        assert_eq!(attempts[1].channel, Channel::Push);
        assert_eq!(attempts[1].outcome, AttemptOutcome::TimedOut);
    }

    #[tokio::test]
    async fn redelivery_is_a_duplicate() {
        let (dispatcher, senders) = setup(DispatcherConfig::default());
        let event = order_event(Some("c1@example.com"), None);

        dispatcher.handle(&event).await.unwrap();
        let second = dispatcher.handle(&event).await.unwrap();

        assert_eq!(second, DispatchOutcome::Duplicate);
        assert_eq!(senders.email.sent_count().await, 1);
        assert_eq!(senders.push.sent_count().await, 1);
    }

    #[tokio::test]
    async fn stock_at_threshold_is_skipped() {
        let (dispatcher, senders) = setup(DispatcherConfig::default());

        let outcome = dispatcher.handle(&inventory_event(10)).await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Skipped(_)));
        assert_eq!(senders.email.sent_count().await, 0);
    }

    #[tokio::test]
    async fn low_stock_alerts_admin_email_and_webhook() {
        let (dispatcher, senders) = setup(DispatcherConfig {
            admin_webhook_url: Some("http://hooks.local/stock".to_string()),
            ..DispatcherConfig::default()
        });

        let outcome = dispatcher.handle(&inventory_event(3)).await.unwrap();

        assert_eq!(channels(&outcome), vec![Channel::Email, Channel::Webhook]);
        let email = senders.email.sent().await;
        assert_eq!(email[0].recipient, "admin@example.com");
        assert!(email[0].message.body.contains("Widget (p1) is down to 3 units"));
        assert_eq!(
            senders.webhook.sent().await[0].recipient,
            "http://hooks.local/stock"
        );
        assert_eq!(senders.sms.sent_count().await, 0);
        assert_eq!(senders.push.sent_count().await, 0);
    }

    #[tokio::test]
    async fn payment_event_uses_its_own_contacts() {
        let (dispatcher, senders) = setup(DispatcherConfig::default());
        let event = BusEvent::PaymentProcessed(PaymentProcessedEvent {
            schema_version: SCHEMA_VERSION,
            event_id: EventId::new(),
            order_id: "o-1".into(),
            customer_id: "c1".into(),
            customer_email: Some("pay@example.com".to_string()),
            customer_phone: None,
            amount: 75.48,
            payment_status: "COMPLETED".to_string(),
            timestamp: Utc::now(),
        });

        let outcome = dispatcher.handle(&event).await.unwrap();

        assert_eq!(channels(&outcome), vec![Channel::Email, Channel::Push]);
        let email = senders.email.sent().await;
        assert_eq!(
            email[0].message.body,
            "Payment of $75.48 for order o-1 is COMPLETED."
        );
    }

    #[tokio::test]
    async fn missing_sender_is_recorded_as_failure() {
        let dispatcher =
            NotificationDispatcher::new(InMemoryStateStore::new(), DispatcherConfig::default());

        let outcome = dispatcher.handle(&order_event(None, None)).await.unwrap();

        let DispatchOutcome::Dispatched { attempts, .. } = outcome else {
            panic!("expected Dispatched");
        };
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].outcome, AttemptOutcome::Failed);
        assert!(attempts[0].error.as_deref().unwrap().contains("no sender"));
    }

    #[tokio::test]
    async fn history_outage_is_an_error_and_nothing_is_sent() {
        let store = InMemoryStateStore::new();
        let push = InMemoryChannelSender::new(Channel::Push);
        let dispatcher = NotificationDispatcher::new(store.clone(), DispatcherConfig::default())
            .with_sender(push.clone());
        store.set_fail_on_put(true);

        let result = dispatcher.handle(&order_event(None, None)).await;
        assert!(matches!(result, Err(NotificationError::History(_))));
        assert_eq!(push.sent_count().await, 0);
    }

    #[tokio::test]
    async fn claim_held_by_another_dispatch_sends_nothing() {
        let (dispatcher, senders) = setup(DispatcherConfig::default());
        let event = order_event(Some("c1@example.com"), None);
        dispatcher
            .history()
            .claim(event.event_id(), "in-flight")
            .await
            .unwrap();

        let outcome = dispatcher.handle(&event).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Duplicate);
        assert_eq!(senders.email.sent_count().await, 0);
        assert_eq!(senders.push.sent_count().await, 0);
    }
}
