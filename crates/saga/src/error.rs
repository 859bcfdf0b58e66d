//! Saga error types.

use common::OrderId;
use domain::{Order, OrderError, OrderStatus, ProductId};
use state_store::StateStoreError;
use thiserror::Error;

/// Errors returned by the order saga.
///
/// Availability checker and publish failures never surface here: the first
/// is recovered by failing open, the second is logged and counted.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request was malformed.
    #[error("Validation failed: {0}")]
    Validation(OrderError),

    /// A list page token could not be decoded.
    #[error("Validation failed: invalid page token '{0}'")]
    InvalidPageToken(String),

    /// No order is stored under this ID.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The requested status change is not allowed.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The inventory service reported that an item is out of stock.
    ///
    /// Carries the order as it was left, in `Failed` status.
    #[error("Insufficient inventory for product {product_id}")]
    InsufficientInventory {
        order: Box<Order>,
        product_id: ProductId,
    },

    /// Reading or writing the state store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StateStoreError),

    /// Conditional writes kept losing to concurrent writers.
    #[error("Concurrent modification of '{key}' after {attempts} attempts")]
    ConcurrentModification { key: String, attempts: u32 },
}

impl From<OrderError> for SagaError {
    fn from(error: OrderError) -> Self {
        match error {
            OrderError::InvalidTransition { from, to } => SagaError::InvalidTransition { from, to },
            other => SagaError::Validation(other),
        }
    }
}

impl SagaError {
    /// Returns true if the caller sent a bad request.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SagaError::Validation(_) | SagaError::InvalidPageToken(_)
        )
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
