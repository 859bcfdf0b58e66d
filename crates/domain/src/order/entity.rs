//! Order entity.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use serde::{Deserialize, Serialize};

use super::{Money, NewOrder, OrderError, OrderItem, OrderStatus};

/// An order placed by a customer.
///
/// The order is created once in `Pending` status and afterwards only its
/// status (and `updated_at`) change. Items and the total are fixed at
/// creation, so `total_amount` always equals the sum of item totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    order_id: OrderId,
    customer_id: CustomerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    customer_phone: Option<String>,
    items: Vec<OrderItem>,
    total_amount: Money,
    status: OrderStatus,
    shipping_address: String,
    payment_method: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Validates a request and builds a new `Pending` order with a freshly
    /// allocated ID.
    pub fn place(request: NewOrder, now: DateTime<Utc>) -> Result<Self, OrderError> {
        let items = request.validate()?;
        let total_amount = Money::checked_sum(items.iter().map(|item| item.total_price))
            .ok_or_else(|| {
                OrderError::InvalidAmount("order total is too large".to_string())
            })?;

        Ok(Self {
            order_id: OrderId::new(),
            customer_id: request.customer_id,
            customer_email: non_empty(request.customer_email),
            customer_phone: non_empty(request.customer_phone),
            items,
            total_amount,
            status: OrderStatus::Pending,
            shipping_address: request.shipping_address,
            payment_method: request.payment_method,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the order to `next`.
    ///
    /// Returns `Ok(false)` without touching the order if it is already in
    /// `next`, `Ok(true)` if the status changed, and `InvalidTransition` if
    /// the move is not allowed.
    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, OrderError> {
        if self.status == next {
            return Ok(false);
        }

        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.updated_at = at;
        Ok(true)
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer_email.as_deref()
    }

    pub fn customer_phone(&self) -> Option<&str> {
        self.customer_phone.as_deref()
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the total of all line items, recomputed, or `None` on
    /// overflow.
    pub fn items_total(&self) -> Option<Money> {
        Money::checked_sum(self.items.iter().map(|item| item.total_price))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_request() -> NewOrder {
        NewOrder::new("c1")
            .with_item("p1", 2, Money::from_decimal(29.99).unwrap())
            .with_item("p2", 1, Money::from_decimal(15.50).unwrap())
            .shipping_address("1 Main St")
            .payment_method("card")
    }

    #[test]
    fn place_computes_exact_total() {
        let order = Order::place(scenario_request(), Utc::now()).unwrap();

        assert_eq!(order.total_amount().cents(), 7548);
        assert_eq!(order.total_amount().to_decimal(), 75.48);
        assert_eq!(order.items_total(), Some(order.total_amount()));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.created_at(), order.updated_at());
    }

    #[test]
    fn place_rejects_total_that_overflows() {
        let request = NewOrder::new("c1")
            .with_item("p1", i64::from(u32::MAX), Money::from_cents(2_000_000_000))
            .with_item("p2", 1, Money::from_cents(i64::MAX - 100));

        let result = Order::place(request, Utc::now());
        assert!(matches!(result, Err(OrderError::InvalidAmount(_))));
    }

    #[test]
    fn place_allocates_unique_ids() {
        let a = Order::place(scenario_request(), Utc::now()).unwrap();
        let b = Order::place(scenario_request(), Utc::now()).unwrap();
        assert_ne!(a.order_id(), b.order_id());
    }

    #[test]
    fn place_rejects_invalid_request() {
        let result = Order::place(NewOrder::new("c1"), Utc::now());
        assert_eq!(result, Err(OrderError::NoItems));
    }

    #[test]
    fn blank_contacts_are_dropped() {
        let order = Order::place(
            scenario_request().customer_email("  ").customer_phone("555-0100"),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.customer_email(), None);
        assert_eq!(order.customer_phone(), Some("555-0100"));
    }

    #[test]
    fn transition_updates_status_and_timestamp() {
        let created = Utc::now();
        let mut order = Order::place(scenario_request(), created).unwrap();
        let later = created + chrono::Duration::seconds(5);

        assert_eq!(order.transition_to(OrderStatus::Processing, later), Ok(true));
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.updated_at(), later);
        assert_eq!(order.created_at(), created);
    }

    #[test]
    fn same_status_is_a_no_op() {
        let created = Utc::now();
        let mut order = Order::place(scenario_request(), created).unwrap();

        let later = created + chrono::Duration::seconds(5);
        assert_eq!(order.transition_to(OrderStatus::Pending, later), Ok(false));
        assert_eq!(order.updated_at(), created);
    }

    #[test]
    fn illegal_transition_leaves_order_untouched() {
        let mut order = Order::place(scenario_request(), Utc::now()).unwrap();
        order
            .transition_to(OrderStatus::Processing, Utc::now())
            .unwrap();
        order
            .transition_to(OrderStatus::Completed, Utc::now())
            .unwrap();
        let before = order.clone();

        let result = order.transition_to(OrderStatus::Processing, Utc::now());
        assert_eq!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Completed,
                to: OrderStatus::Processing,
            })
        );
        assert_eq!(order, before);
    }

    #[test]
    fn serialization_roundtrip_preserves_all_fields() {
        let order = Order::place(
            scenario_request().customer_email("c1@example.com"),
            Utc::now(),
        )
        .unwrap();

        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("customer_phone").is_none());

        let restored: Order = serde_json::from_value(json).unwrap();
        assert_eq!(restored, order);
        assert_eq!(restored.total_amount().cents(), 7548);
    }
}
