//! Saga coordinator owning the order lifecycle.

use std::future::Future;
use std::time::Instant;

use chrono::Utc;
use common::{CustomerId, OrderId};
use domain::{NewOrder, Order, OrderError, OrderStatus, ProductId};
use event_bus::{BusEvent, EventPublisher};
use state_store::{PutOptions, StateStore, StateStoreExt, Version};

use crate::config::SagaConfig;
use crate::error::{Result, SagaError};
use crate::pagination::{self, CustomerOrderIndex, OrderPage, PageCursor};
use crate::services::{Availability, AvailabilityChecker};

/// Orchestrates order creation and status changes across the state store,
/// the inventory availability checker and the event bus.
///
/// Holds no mutable state of its own; any number of calls may run
/// concurrently against one coordinator.
pub struct OrderSagaCoordinator<S, A, P>
where
    S: StateStore,
    A: AvailabilityChecker,
    P: EventPublisher,
{
    store: S,
    availability: A,
    publisher: P,
    config: SagaConfig,
}

impl<S, A, P> OrderSagaCoordinator<S, A, P>
where
    S: StateStore,
    A: AvailabilityChecker,
    P: EventPublisher,
{
    /// Creates a coordinator with the default configuration.
    pub fn new(store: S, availability: A, publisher: P) -> Self {
        Self::with_config(store, availability, publisher, SagaConfig::default())
    }

    /// Creates a coordinator with an explicit configuration.
    pub fn with_config(store: S, availability: A, publisher: P, config: SagaConfig) -> Self {
        Self {
            store,
            availability,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Places a new order.
    ///
    /// The order is persisted before inventory is checked. If any item is
    /// out of stock the order is moved to `Failed` and
    /// `InsufficientInventory` is returned; no event is published. If the
    /// inventory service cannot be reached the check fails open.
    #[tracing::instrument(
        skip_all,
        fields(customer_id = %request.customer_id, order_id = tracing::field::Empty)
    )]
    pub async fn create_order(&self, request: NewOrder) -> Result<Order> {
        timed("create_order", self.create_order_inner(request)).await
    }

    async fn create_order_inner(&self, request: NewOrder) -> Result<Order> {
        let mut order = Order::place(request, Utc::now())?;
        tracing::Span::current().record("order_id", order.order_id().as_str());

        let version = self
            .store
            .put_json(order.order_id().as_str(), &order, PutOptions::expect_new())
            .await?;
        self.add_to_customer_index(&order).await?;

        if let Some(product_id) = self.first_unavailable_item(&order).await {
            order.transition_to(OrderStatus::Failed, Utc::now())?;
            self.persist_failed(&order, version).await;

            tracing::info!(%product_id, "order rejected: insufficient inventory");
            return Err(SagaError::InsufficientInventory {
                order: Box::new(order),
                product_id,
            });
        }

        self.publish(&BusEvent::order_created(&order)).await;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(total = %order.total_amount(), "order created");

        Ok(order)
    }

    /// Reads an order by ID.
    #[tracing::instrument(skip_all, fields(%order_id))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        let (order, _) = self.load(order_id).await?;
        Ok(order)
    }

    /// Moves an order to `status`.
    ///
    /// Requesting the status the order already has is a no-op: nothing is
    /// written and no event is published. Otherwise `order.updated` is
    /// published (with `notes` as its reason) after the write succeeds.
    #[tracing::instrument(skip_all, fields(%order_id, %status))]
    pub async fn update_order(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        notes: Option<String>,
    ) -> Result<Order> {
        timed(
            "update_order",
            self.change_status(order_id, status, |order| {
                BusEvent::order_updated(order, notes.clone())
            }),
        )
        .await
    }

    /// Cancels an order.
    ///
    /// Publishes a single `order.cancelled` event carrying `reason`; no
    /// `order.updated` is emitted for the same change.
    #[tracing::instrument(skip_all, fields(%order_id))]
    pub async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<Order> {
        timed(
            "cancel_order",
            self.change_status(order_id, OrderStatus::Cancelled, |order| {
                BusEvent::order_cancelled(order, reason)
            }),
        )
        .await
    }

    /// Lists a customer's orders, newest first.
    ///
    /// `page_size` 0 selects the default size; larger sizes are capped.
    #[tracing::instrument(skip_all, fields(%customer_id, page_size = page_size))]
    pub async fn list_orders(
        &self,
        customer_id: &CustomerId,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<OrderPage> {
        if customer_id.is_blank() {
            return Err(OrderError::CustomerIdRequired.into());
        }

        let cursor = page_token
            .filter(|token| !token.is_empty())
            .map(PageCursor::decode)
            .transpose()?;

        let index = self
            .store
            .get_json::<CustomerOrderIndex>(&pagination::index_key(customer_id))
            .await?
            .map(|(index, _)| index)
            .unwrap_or_default();

        let (entries, next) = index.page(self.config.page_size(page_size), cursor.as_ref());

        let mut orders = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.store.get_json::<Order>(entry.order_id.as_str()).await? {
                Some((order, _)) => orders.push(order),
                None => tracing::warn!(order_id = %entry.order_id, "indexed order is missing"),
            }
        }

        Ok(OrderPage {
            orders,
            next_page_token: next.map(|cursor| cursor.encode()),
            total_count: index.len(),
        })
    }

    async fn load(&self, order_id: &OrderId) -> Result<(Order, Version)> {
        self.store
            .get_json::<Order>(order_id.as_str())
            .await?
            .ok_or_else(|| SagaError::NotFound(order_id.clone()))
    }

    /// Read, transition, conditional write; repeated while the write loses
    /// a version race.
    async fn change_status<F>(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        event: F,
    ) -> Result<Order>
    where
        F: Fn(&Order) -> BusEvent,
    {
        let attempts = self.config.max_update_attempts.max(1);

        for attempt in 1..=attempts {
            let (mut order, version) = self.load(order_id).await?;

            if !order.transition_to(status, Utc::now())? {
                tracing::debug!("status unchanged, nothing to do");
                return Ok(order);
            }

            match self
                .store
                .put_json(order_id.as_str(), &order, PutOptions::expect_version(version))
                .await
            {
                Ok(_) => {
                    self.publish(&event(&order)).await;
                    tracing::info!(%status, "order status changed");
                    return Ok(order);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(attempt, "version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(attempts, "giving up after repeated version conflicts");
        Err(SagaError::ConcurrentModification {
            key: order_id.to_string(),
            attempts,
        })
    }

    async fn add_to_customer_index(&self, order: &Order) -> Result<()> {
        let key = pagination::index_key(order.customer_id());
        let attempts = self.config.max_update_attempts.max(1);

        for attempt in 1..=attempts {
            let (mut index, options) = match self
                .store
                .get_json::<CustomerOrderIndex>(&key)
                .await?
            {
                Some((index, version)) => (index, PutOptions::expect_version(version)),
                None => (CustomerOrderIndex::default(), PutOptions::expect_new()),
            };

            if !index.insert(order) {
                return Ok(());
            }

            match self.store.put_json(&key, &index, options).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(attempt, %key, "index version conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SagaError::ConcurrentModification { key, attempts })
    }

    /// Returns the first item the inventory service says is out of stock.
    async fn first_unavailable_item(&self, order: &Order) -> Option<ProductId> {
        for item in order.items() {
            let check = self.availability.check(&item.product_id, item.quantity);
            match tokio::time::timeout(self.config.availability_timeout, check).await {
                Ok(Ok(Availability::Available)) => {}
                Ok(Ok(Availability::Unavailable)) => return Some(item.product_id.clone()),
                Ok(Err(e)) => {
                    metrics::counter!("availability_fail_open_total").increment(1);
                    tracing::warn!(product_id = %item.product_id, error = %e, "availability check failed, assuming available");
                }
                Err(_) => {
                    metrics::counter!("availability_fail_open_total").increment(1);
                    tracing::warn!(
                        product_id = %item.product_id,
                        timeout_ms = self.config.availability_timeout.as_millis() as u64,
                        "availability check timed out, assuming available"
                    );
                }
            }
        }
        None
    }

    /// Writes the `Failed` status back. The caller is told about the
    /// rejection either way, so a failure here is only logged.
    async fn persist_failed(&self, order: &Order, version: Version) {
        let result = self
            .store
            .put_json(order.order_id().as_str(), order, PutOptions::expect_version(version))
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist FAILED status");
        }
    }

    async fn publish(&self, event: &BusEvent) {
        let topic = event.topic();
        match self.publisher.publish(topic, event).await {
            Ok(()) => {
                metrics::counter!("order_events_published_total", "topic" => topic).increment(1);
                tracing::debug!(%topic, event_id = %event.event_id(), "event published");
            }
            Err(e) => {
                metrics::counter!("order_events_publish_failed_total", "topic" => topic)
                    .increment(1);
                tracing::warn!(
                    %topic,
                    event_id = %event.event_id(),
                    error = %e,
                    "failed to publish event"
                );
            }
        }
    }
}

async fn timed<T>(operation: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
    let started = Instant::now();
    let result = fut.await;
    let outcome = if result.is_ok() { "success" } else { "failure" };
    metrics::histogram!(
        "saga_operation_duration_seconds",
        "operation" => operation,
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryAvailabilityChecker;
    use domain::Money;
    use event_bus::{InMemoryEventBus, topics};
    use state_store::InMemoryStateStore;

    type TestCoordinator =
        OrderSagaCoordinator<InMemoryStateStore, InMemoryAvailabilityChecker, InMemoryEventBus>;

    fn setup() -> (
        TestCoordinator,
        InMemoryStateStore,
        InMemoryAvailabilityChecker,
        InMemoryEventBus,
    ) {
        let store = InMemoryStateStore::new();
        let checker = InMemoryAvailabilityChecker::new();
        let bus = InMemoryEventBus::new();
        let coordinator = OrderSagaCoordinator::new(store.clone(), checker.clone(), bus.clone());
        (coordinator, store, checker, bus)
    }

    fn request(customer: &str) -> NewOrder {
        NewOrder::new(customer)
            .with_item("p1", 2, Money::from_cents(2999))
            .with_item("p2", 1, Money::from_cents(1550))
            .shipping_address("1 Main St")
            .payment_method("card")
    }

    #[tokio::test]
    async fn create_persists_and_publishes() {
        let (coordinator, store, _, bus) = setup();

        let order = coordinator.create_order(request("c1")).await.unwrap();

        let (stored, version) = store
            .get_json::<Order>(order.order_id().as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, order);
        assert_eq!(version, Version::first());
        assert_eq!(bus.published_to(topics::ORDER_CREATED).await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_request_writes_nothing() {
        let (coordinator, store, checker, bus) = setup();

        let result = coordinator.create_order(NewOrder::new("c1")).await;

        assert!(matches!(result, Err(SagaError::Validation(OrderError::NoItems))));
        assert_eq!(store.entry_count().await, 0);
        assert_eq!(checker.call_count(), 0);
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn store_failure_aborts_before_availability_and_publish() {
        let (coordinator, store, checker, bus) = setup();
        store.set_fail_on_put(true);

        let result = coordinator.create_order(request("c1")).await;

        assert!(matches!(result, Err(SagaError::Persistence(_))));
        assert_eq!(checker.call_count(), 0);
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn out_of_stock_fails_order_without_event() {
        let (coordinator, store, checker, bus) = setup();
        checker.set_stock("p2", 0);

        let result = coordinator.create_order(request("c1")).await;

        let Err(SagaError::InsufficientInventory { order, product_id }) = result else {
            panic!("expected InsufficientInventory");
        };
        assert_eq!(product_id.as_str(), "p2");
        assert_eq!(order.status(), OrderStatus::Failed);

        let (stored, _) = store
            .get_json::<Order>(order.order_id().as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status(), OrderStatus::Failed);
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_create() {
        let (coordinator, store, _, bus) = setup();
        bus.set_fail_on_publish(true);

        let order = coordinator.create_order(request("c1")).await.unwrap();

        assert!(store.exists(order.order_id().as_str()).await.unwrap());
        assert_eq!(bus.published_count().await, 0);
    }

    #[tokio::test]
    async fn same_status_update_is_a_no_op() {
        let (coordinator, store, _, bus) = setup();
        let order = coordinator.create_order(request("c1")).await.unwrap();

        let unchanged = coordinator
            .update_order(order.order_id(), OrderStatus::Pending, None)
            .await
            .unwrap();

        assert_eq!(unchanged, order);
        let (_, version) = store
            .get_json::<Order>(order.order_id().as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(version, Version::first());
        assert!(bus.published_to(topics::ORDER_UPDATED).await.is_empty());
    }

    #[tokio::test]
    async fn update_carries_notes_as_reason() {
        let (coordinator, _, _, bus) = setup();
        let order = coordinator.create_order(request("c1")).await.unwrap();

        coordinator
            .update_order(
                order.order_id(),
                OrderStatus::Processing,
                Some("picked".to_string()),
            )
            .await
            .unwrap();

        let events = bus.published_to(topics::ORDER_UPDATED).await;
        let [BusEvent::OrderUpdated(event)] = events.as_slice() else {
            panic!("expected one order.updated, got {events:?}");
        };
        assert_eq!(event.reason.as_deref(), Some("picked"));
        assert_eq!(event.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn conflicts_are_retried() {
        let (coordinator, store, _, bus) = setup();
        let order = coordinator.create_order(request("c1")).await.unwrap();
        store.force_conflicts(2);

        let updated = coordinator
            .update_order(order.order_id(), OrderStatus::Processing, None)
            .await
            .unwrap();

        assert_eq!(updated.status(), OrderStatus::Processing);
        assert_eq!(bus.published_to(topics::ORDER_UPDATED).await.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_concurrent_modification() {
        let (coordinator, store, _, bus) = setup();
        let order = coordinator.create_order(request("c1")).await.unwrap();
        store.force_conflicts(3);

        let result = coordinator
            .update_order(order.order_id(), OrderStatus::Processing, None)
            .await;

        assert!(matches!(
            result,
            Err(SagaError::ConcurrentModification { attempts: 3, .. })
        ));
        assert_eq!(
            coordinator.get_order(order.order_id()).await.unwrap().status(),
            OrderStatus::Pending
        );
        assert!(bus.published_to(topics::ORDER_UPDATED).await.is_empty());
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let (coordinator, _, _, _) = setup();
        let id = OrderId::from_string("nope");

        assert!(matches!(
            coordinator.get_order(&id).await,
            Err(SagaError::NotFound(_))
        ));
        assert!(matches!(
            coordinator.cancel_order(&id, "x").await,
            Err(SagaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_rejects_blank_customer_and_bad_token() {
        let (coordinator, _, _, _) = setup();

        let blank = coordinator.list_orders(&CustomerId::new(" "), 0, None).await;
        assert!(matches!(blank, Err(ref e) if e.is_validation()));

        let bad = coordinator
            .list_orders(&CustomerId::new("c1"), 0, Some("not-a-token"))
            .await;
        assert!(matches!(bad, Err(SagaError::InvalidPageToken(_))));
    }

    #[tokio::test]
    async fn list_of_unknown_customer_is_empty() {
        let (coordinator, _, _, _) = setup();

        let page = coordinator
            .list_orders(&CustomerId::new("nobody"), 0, Some(""))
            .await
            .unwrap();

        assert!(page.orders.is_empty());
        assert_eq!(page.next_page_token, None);
        assert_eq!(page.total_count, 0);
    }
}
