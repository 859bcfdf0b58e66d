//! Order lifecycle saga.
//!
//! The [`OrderSagaCoordinator`] owns the order entity. Creating an order
//! validates the request, persists it, checks inventory for every item and,
//! if stock is available, publishes `order.created`. Status changes are
//! checked against the order state machine and written with compare-and-swap
//! on the stored version, retrying on conflict.
//!
//! The steps are not transactional: the state store is the source of truth
//! and events are a best-effort signal derived from it.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod pagination;
pub mod services;

pub use config::SagaConfig;
pub use coordinator::OrderSagaCoordinator;
pub use error::{Result, SagaError};
pub use pagination::{CustomerOrderIndex, OrderPage, PageCursor};
pub use services::{
    Availability, AvailabilityChecker, AvailabilityError, HttpAvailabilityChecker,
    InMemoryAvailabilityChecker,
};
