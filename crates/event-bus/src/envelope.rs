//! The JSON envelope carried on every topic.

use chrono::{DateTime, Utc};
use common::{CustomerId, EventId, OrderId};
use domain::{Order, OrderItem, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::topics;

/// Current envelope schema version.
pub const SCHEMA_VERSION: u32 = 1;

fn current_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// An event travelling on the bus, discriminated by `event_type`.
///
/// Each variant is published on the topic with the same name as its
/// `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum BusEvent {
    #[serde(rename = "order.created")]
    OrderCreated(OrderEvent),

    #[serde(rename = "order.updated")]
    OrderUpdated(OrderEvent),

    #[serde(rename = "order.cancelled")]
    OrderCancelled(OrderEvent),

    #[serde(rename = "payment.processed")]
    PaymentProcessed(PaymentProcessedEvent),

    #[serde(rename = "inventory.updated")]
    InventoryUpdated(InventoryUpdatedEvent),
}

impl BusEvent {
    /// Builds an `order.created` event from a freshly persisted order.
    pub fn order_created(order: &Order) -> Self {
        BusEvent::OrderCreated(OrderEvent::snapshot(order, None))
    }

    /// Builds an `order.updated` event after a status change.
    pub fn order_updated(order: &Order, notes: Option<String>) -> Self {
        BusEvent::OrderUpdated(OrderEvent::snapshot(order, notes))
    }

    /// Builds an `order.cancelled` event carrying the cancellation reason.
    pub fn order_cancelled(order: &Order, reason: impl Into<String>) -> Self {
        BusEvent::OrderCancelled(OrderEvent::snapshot(order, Some(reason.into())))
    }

    /// The unique ID of this publish.
    pub fn event_id(&self) -> EventId {
        match self {
            BusEvent::OrderCreated(e) | BusEvent::OrderUpdated(e) | BusEvent::OrderCancelled(e) => {
                e.event_id
            }
            BusEvent::PaymentProcessed(e) => e.event_id,
            BusEvent::InventoryUpdated(e) => e.event_id,
        }
    }

    /// The `event_type` discriminator.
    pub fn event_type(&self) -> &'static str {
        match self {
            BusEvent::OrderCreated(_) => topics::ORDER_CREATED,
            BusEvent::OrderUpdated(_) => topics::ORDER_UPDATED,
            BusEvent::OrderCancelled(_) => topics::ORDER_CANCELLED,
            BusEvent::PaymentProcessed(_) => topics::PAYMENT_PROCESSED,
            BusEvent::InventoryUpdated(_) => topics::INVENTORY_UPDATED,
        }
    }

    /// The topic this event is published on.
    pub fn topic(&self) -> &'static str {
        self.event_type()
    }

    pub fn schema_version(&self) -> u32 {
        match self {
            BusEvent::OrderCreated(e) | BusEvent::OrderUpdated(e) | BusEvent::OrderCancelled(e) => {
                e.schema_version
            }
            BusEvent::PaymentProcessed(e) => e.schema_version,
            BusEvent::InventoryUpdated(e) => e.schema_version,
        }
    }

    /// The ID of the entity the event is about (order or product).
    pub fn entity_id(&self) -> &str {
        match self {
            BusEvent::OrderCreated(e) | BusEvent::OrderUpdated(e) | BusEvent::OrderCancelled(e) => {
                e.order_id.as_str()
            }
            BusEvent::PaymentProcessed(e) => e.order_id.as_str(),
            BusEvent::InventoryUpdated(e) => &e.product_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            BusEvent::OrderCreated(e) | BusEvent::OrderUpdated(e) | BusEvent::OrderCancelled(e) => {
                e.timestamp
            }
            BusEvent::PaymentProcessed(e) => e.timestamp,
            BusEvent::InventoryUpdated(e) => e.timestamp,
        }
    }
}

/// Envelope for the three order topics.
///
/// The header fields duplicate parts of `data` so consumers can route and
/// filter without decoding the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,

    pub event_id: EventId,

    pub order_id: OrderId,

    pub customer_id: CustomerId,

    /// Order total in currency units.
    pub total_amount: f64,

    pub status: OrderStatus,

    pub timestamp: DateTime<Utc>,

    /// Update notes or cancellation reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Full order snapshot at emission time.
    pub data: OrderSnapshot,
}

impl OrderEvent {
    /// Captures an order as it is right now under a fresh event ID.
    pub fn snapshot(order: &Order, reason: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            event_id: EventId::new(),
            order_id: order.order_id().clone(),
            customer_id: order.customer_id().clone(),
            total_amount: order.total_amount().to_decimal(),
            status: order.status(),
            timestamp: Utc::now(),
            reason,
            data: OrderSnapshot::from(order),
        }
    }
}

/// Wire form of an order inside an envelope.
///
/// Amounts are in currency units, the same unit as the envelope header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    pub items: Vec<OrderItemSnapshot>,
    pub total_amount: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemSnapshot {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total_price: f64,
}

impl From<&OrderItem> for OrderItemSnapshot {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            unit_price: item.unit_price.to_decimal(),
            total_price: item.total_price.to_decimal(),
        }
    }
}

impl From<&Order> for OrderSnapshot {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id().clone(),
            customer_id: order.customer_id().clone(),
            customer_email: order.customer_email().map(str::to_string),
            customer_phone: order.customer_phone().map(str::to_string),
            items: order.items().iter().map(OrderItemSnapshot::from).collect(),
            total_amount: order.total_amount().to_decimal(),
            status: order.status(),
            shipping_address: order.shipping_address().to_string(),
            payment_method: order.payment_method().to_string(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

/// Envelope published by the payment service once a charge settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentProcessedEvent {
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,

    pub event_id: EventId,

    pub order_id: OrderId,

    pub customer_id: CustomerId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,

    /// Charged amount in currency units.
    pub amount: f64,

    pub payment_status: String,

    pub timestamp: DateTime<Utc>,
}

/// Envelope published by the inventory service when stock levels change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryUpdatedEvent {
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,

    pub event_id: EventId,

    pub product_id: String,

    #[serde(default)]
    pub product_name: String,

    #[serde(alias = "new_quantity")]
    pub available_quantity: i64,

    pub timestamp: DateTime<Utc>,
}
