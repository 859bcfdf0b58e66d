//! State store client.
//!
//! A durable key/value store holding JSON values under string keys. Every
//! key carries a monotonically increasing [`Version`]; writes may be made
//! conditional on the version last read, which is how callers implement
//! optimistic concurrency control without locks.

pub mod entry;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use entry::{StateEntry, Version};
pub use error::{Result, StateStoreError};
pub use memory::InMemoryStateStore;
pub use postgres::PostgresStateStore;
pub use store::{PutOptions, StateStore, StateStoreExt};
