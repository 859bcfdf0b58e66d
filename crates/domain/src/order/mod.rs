//! Order entity and related types.

mod entity;
mod new_order;
mod state;
mod value_objects;

pub use entity::Order;
pub use new_order::{NewOrder, NewOrderItem};
pub use state::OrderStatus;
pub use value_objects::{Money, OrderItem, ProductId};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    /// Customer ID is required.
    #[error("Customer ID is required")]
    CustomerIdRequired,

    /// Order has no items.
    #[error("Order must contain at least one item")]
    NoItems,

    /// A line item has no product ID.
    #[error("Item {index} has no product ID")]
    ProductIdRequired { index: usize },

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: String, quantity: i64 },

    /// Invalid price.
    #[error("Invalid unit price for {product_id}: {price} (must not be negative)")]
    InvalidPrice { product_id: String, price: Money },

    /// An amount could not be represented in cents.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The requested status change is not in the transition table.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A status string did not name a known status.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

impl OrderError {
    /// Returns true if the error rejects caller input before any write.
    pub fn is_validation(&self) -> bool {
        !matches!(self, OrderError::InvalidTransition { .. })
    }
}
