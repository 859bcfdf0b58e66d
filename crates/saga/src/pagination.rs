//! Per-customer order index and cursor pagination over it.
//!
//! Orders are listed newest first. Ties on `created_at` are broken by
//! `order_id`, so the ordering is total and a cursor naming the last order
//! of a page identifies exactly where the next page starts, even if new
//! orders arrive in between.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use domain::Order;
use serde::{Deserialize, Serialize};

use crate::SagaError;

/// State store key of a customer's order index.
pub fn index_key(customer_id: &CustomerId) -> String {
    format!("customer_orders:{customer_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
}

impl IndexEntry {
    fn sort_key(&self) -> (DateTime<Utc>, &OrderId) {
        (self.created_at, &self.order_id)
    }
}

/// The orders a customer has placed, as stored under [`index_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrderIndex {
    entries: Vec<IndexEntry>,
}

impl CustomerOrderIndex {
    /// Records an order. Returns false if it was already indexed.
    pub fn insert(&mut self, order: &Order) -> bool {
        if self
            .entries
            .iter()
            .any(|entry| &entry.order_id == order.order_id())
        {
            return false;
        }

        self.entries.push(IndexEntry {
            order_id: order.order_id().clone(),
            created_at: order.created_at(),
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns up to `size` entries following `after`, newest first, and the
    /// cursor for the next page if more entries remain.
    pub fn page(&self, size: usize, after: Option<&PageCursor>) -> (Vec<&IndexEntry>, Option<PageCursor>) {
        let mut remaining: Vec<&IndexEntry> = self
            .entries
            .iter()
            .filter(|entry| after.is_none_or(|cursor| entry.sort_key() < cursor.sort_key()))
            .collect();
        remaining.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));

        let has_more = remaining.len() > size;
        remaining.truncate(size);

        let next = if has_more {
            remaining.last().map(|entry| PageCursor::from_entry(entry))
        } else {
            None
        };
        (remaining, next)
    }
}

/// Position in a customer's order listing: the last order of the previous
/// page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    created_at: DateTime<Utc>,
    order_id: OrderId,
}

impl PageCursor {
    fn from_entry(entry: &IndexEntry) -> Self {
        Self {
            created_at: entry.created_at,
            order_id: entry.order_id.clone(),
        }
    }

    fn sort_key(&self) -> (DateTime<Utc>, &OrderId) {
        (self.created_at, &self.order_id)
    }

    /// Encodes the cursor as an opaque page token.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}",
            self.created_at.timestamp_nanos_opt().unwrap_or(i64::MAX),
            self.order_id
        )
    }

    /// Decodes a page token produced by [`encode`](Self::encode).
    pub fn decode(token: &str) -> Result<Self, SagaError> {
        let invalid = || SagaError::InvalidPageToken(token.to_string());

        let (nanos, order_id) = token.split_once(':').ok_or_else(invalid)?;
        let nanos: i64 = nanos.parse().map_err(|_| invalid())?;
        if order_id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            created_at: DateTime::from_timestamp_nanos(nanos),
            order_id: OrderId::from_string(order_id),
        })
    }
}

/// One page of a customer's orders.
#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,

    /// Token for the following page; None once the listing is exhausted.
    pub next_page_token: Option<String>,

    /// Number of orders the customer has in total.
    pub total_count: usize,
}
