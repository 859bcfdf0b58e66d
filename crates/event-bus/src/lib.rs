//! Event envelopes and the bus they travel on.
//!
//! The saga publishes a fact after each meaningful order state change; the
//! notification pipeline consumes those facts (plus payment and inventory
//! facts from other producers). Delivery is at-least-once, so every envelope
//! carries a unique `event_id` that consumers deduplicate on.
//!
//! Publishing is best-effort and never transactional with the state write
//! that preceded it.

pub mod dapr;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod topics;

pub use dapr::DaprEventPublisher;
pub use envelope::{
    BusEvent, InventoryUpdatedEvent, OrderEvent, OrderItemSnapshot, OrderSnapshot,
    PaymentProcessedEvent, SCHEMA_VERSION,
};
pub use error::EventBusError;
pub use memory::{DEFAULT_LOG_CAPACITY, InMemoryEventBus};
pub use publisher::{EventPublisher, EventStream, EventSubscriber};
