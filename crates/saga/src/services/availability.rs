//! Inventory availability checker trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::ProductId;
use thiserror::Error;

/// Answer from the inventory capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
}

impl From<bool> for Availability {
    fn from(available: bool) -> Self {
        if available {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }
}

/// The inventory capability could not give an answer.
///
/// Distinct from [`Availability::Unavailable`], which is a real answer.
#[derive(Debug, Error)]
pub enum AvailabilityError {
    /// The service could not be reached.
    #[error("Inventory service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with something other than an availability result.
    #[error("Invalid inventory response: {0}")]
    InvalidResponse(String),
}

/// Checks whether a quantity of a product can be supplied.
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    async fn check(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Availability, AvailabilityError>;
}

#[async_trait]
impl<T: AvailabilityChecker + ?Sized> AvailabilityChecker for Arc<T> {
    async fn check(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Availability, AvailabilityError> {
        (**self).check(product_id, quantity).await
    }
}

#[derive(Debug, Default)]
struct CheckerState {
    stock: HashMap<ProductId, u32>,
    delay: Option<Duration>,
}

/// In-memory availability checker for tests and single-process runs.
///
/// Products without a configured stock level are unlimited, so an empty
/// checker approves everything.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAvailabilityChecker {
    state: Arc<RwLock<CheckerState>>,
    unreachable: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryAvailabilityChecker {
    /// Creates a checker with no stock limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the available stock for a product.
    pub fn set_stock(&self, product_id: impl Into<ProductId>, quantity: u32) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .stock
            .insert(product_id.into(), quantity);
    }

    /// Makes every check fail as if the inventory service were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delays every answer, to exercise caller timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .delay = delay;
    }

    /// Returns the number of checks made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvailabilityChecker for InMemoryAvailabilityChecker {
    async fn check(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Availability, AvailabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (stock, delay) = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            (state.stock.get(product_id).copied(), state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AvailabilityError::Unreachable(
                "injected outage".to_string(),
            ));
        }

        Ok(stock.is_none_or(|available| available >= quantity).into())
    }
}
