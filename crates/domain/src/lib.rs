//! Domain layer for the order saga.
//!
//! This crate provides the order entity and the rules it enforces:
//! - Validation of a requested order before anything is written
//! - Exact, integer-cent totals derived from immutable line items
//! - The order status state machine and its allowed transitions

pub mod order;

pub use order::{
    Money, NewOrder, NewOrderItem, Order, OrderError, OrderItem, OrderStatus, ProductId,
};
