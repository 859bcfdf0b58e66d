use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Result, StateEntry, Version};

/// Options for writing a value to the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct PutOptions {
    /// Expected current version of the key for optimistic concurrency control.
    /// If None, the write is unconditional (last writer wins).
    pub expected_version: Option<Version>,
}

impl PutOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the key to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the key to not exist yet (insert-if-absent).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Core trait for state store clients.
///
/// Implementations must be thread-safe (Send + Sync); the store is shared by
/// every concurrently running request.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns None if the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<StateEntry>>;

    /// Writes `value` under `key`.
    ///
    /// If `options.expected_version` is set, the write fails with
    /// `ConcurrencyConflict` unless the key is currently at that version.
    ///
    /// Returns the new version of the key.
    async fn put(&self, key: &str, value: serde_json::Value, options: PutOptions)
    -> Result<Version>;
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<StateEntry>> {
        (**self).get(key).await
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        options: PutOptions,
    ) -> Result<Version> {
        (**self).put(key, value, options).await
    }
}

/// Extension trait providing typed access on top of raw JSON values.
#[async_trait]
pub trait StateStoreExt: StateStore {
    /// Reads and deserializes the value under `key` along with its version.
    ///
    /// Absent and empty values both yield None.
    async fn get_json<T>(&self, key: &str) -> Result<Option<(T, Version)>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(entry) if !entry.is_empty() => {
                let value = serde_json::from_value(entry.value)?;
                Ok(Some((value, entry.version)))
            }
            _ => Ok(None),
        }
    }

    /// Serializes `value` and writes it under `key`.
    async fn put_json<T>(&self, key: &str, value: &T, options: PutOptions) -> Result<Version>
    where
        T: Serialize + Sync + ?Sized,
    {
        let json = serde_json::to_value(value)?;
        self.put(key, json, options).await
    }

    /// Checks if a non-empty value exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .get(key)
            .await?
            .is_some_and(|entry| !entry.is_empty()))
    }
}

// Blanket implementation for all StateStore implementations
impl<T: StateStore + ?Sized> StateStoreExt for T {}
