use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Result, StateEntry, StateStoreError, Version,
    store::{PutOptions, StateStore},
};

#[derive(Debug, Default)]
struct FailureInjection {
    fail_on_get: AtomicBool,
    fail_on_put: AtomicBool,
    /// Number of upcoming conditional writes to reject with a conflict.
    forced_conflicts: AtomicUsize,
}

/// In-memory state store implementation for testing and single-process runs.
///
/// Provides the same versioning semantics as the PostgreSQL implementation,
/// plus failure injection hooks for exercising error paths.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    entries: Arc<RwLock<HashMap<String, StateEntry>>>,
    failures: Arc<FailureInjection>,
}

impl InMemoryStateStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of keys stored.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns all stored keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut keys: Vec<_> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Configures every read to fail as if the store were unreachable.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.failures.fail_on_get.store(fail, Ordering::SeqCst);
    }

    /// Configures every write to fail as if the store were unreachable.
    pub fn set_fail_on_put(&self, fail: bool) {
        self.failures.fail_on_put.store(fail, Ordering::SeqCst);
    }

    /// Rejects the next `count` conditional writes with a version conflict,
    /// simulating a concurrent writer winning the race.
    pub fn force_conflicts(&self, count: usize) {
        self.failures.forced_conflicts.store(count, Ordering::SeqCst);
    }

    /// Clears all entries.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    fn take_forced_conflict(&self) -> bool {
        self.failures
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateEntry>> {
        if self.failures.fail_on_get.load(Ordering::SeqCst) {
            return Err(StateStoreError::Unavailable(
                "injected read failure".to_string(),
            ));
        }

        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        options: PutOptions,
    ) -> Result<Version> {
        if self.failures.fail_on_put.load(Ordering::SeqCst) {
            return Err(StateStoreError::Unavailable(
                "injected write failure".to_string(),
            ));
        }

        let mut entries = self.entries.write().await;

        let current_version = entries
            .get(key)
            .map(|e| e.version)
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version {
            if self.take_forced_conflict() {
                return Err(StateStoreError::ConcurrencyConflict {
                    key: key.to_string(),
                    expected,
                    actual: current_version.next(),
                });
            }

            if current_version != expected {
                return Err(StateStoreError::ConcurrencyConflict {
                    key: key.to_string(),
                    expected,
                    actual: current_version,
                });
            }
        }

        let new_version = current_version.next();
        entries.insert(
            key.to_string(),
            StateEntry {
                key: key.to_string(),
                value,
                version: new_version,
                updated_at: Utc::now(),
            },
        );

        Ok(new_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateStoreExt;

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryStateStore::new();

        let version = store
            .put("k", serde_json::json!({"a": 1}), PutOptions::new())
            .await
            .unwrap();
        assert_eq!(version, Version::first());

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.value, serde_json::json!({"a": 1}));
        assert_eq!(entry.version, Version::first());
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let store = InMemoryStateStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unconditional_writes_increment_version() {
        let store = InMemoryStateStore::new();
        store
            .put("k", serde_json::json!(1), PutOptions::new())
            .await
            .unwrap();
        let v = store
            .put("k", serde_json::json!(2), PutOptions::new())
            .await
            .unwrap();
        assert_eq!(v, Version::new(2));
    }

    #[tokio::test]
    async fn expect_new_rejects_existing_key() {
        let store = InMemoryStateStore::new();
        store
            .put("k", serde_json::json!(1), PutOptions::expect_new())
            .await
            .unwrap();

        let result = store
            .put("k", serde_json::json!(2), PutOptions::expect_new())
            .await;
        assert!(matches!(
            result,
            Err(StateStoreError::ConcurrencyConflict { actual, .. }) if actual == Version::first()
        ));
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryStateStore::new();
        let v1 = store
            .put("k", serde_json::json!(1), PutOptions::new())
            .await
            .unwrap();
        store
            .put("k", serde_json::json!(2), PutOptions::expect_version(v1))
            .await
            .unwrap();

        let result = store
            .put("k", serde_json::json!(3), PutOptions::expect_version(v1))
            .await;
        assert!(result.unwrap_err().is_conflict());

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.value, serde_json::json!(2));
    }

    #[tokio::test]
    async fn forced_conflicts_are_consumed() {
        let store = InMemoryStateStore::new();
        store.force_conflicts(1);

        let first = store
            .put("k", serde_json::json!(1), PutOptions::expect_new())
            .await;
        assert!(first.unwrap_err().is_conflict());

        let second = store
            .put("k", serde_json::json!(1), PutOptions::expect_new())
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = InMemoryStateStore::new();
        store.set_fail_on_put(true);
        let result = store
            .put("k", serde_json::json!(1), PutOptions::new())
            .await;
        assert!(matches!(result, Err(StateStoreError::Unavailable(_))));
        assert_eq!(store.entry_count().await, 0);

        store.set_fail_on_get(true);
        assert!(store.get("k").await.is_err());
    }

    #[tokio::test]
    async fn typed_access_skips_empty_values() {
        let store = InMemoryStateStore::new();
        store
            .put("empty", serde_json::Value::Null, PutOptions::new())
            .await
            .unwrap();
        store
            .put_json("list", &vec![1, 2, 3], PutOptions::new())
            .await
            .unwrap();

        let empty: Option<(Vec<i32>, Version)> = store.get_json("empty").await.unwrap();
        assert!(empty.is_none());
        assert!(!store.exists("empty").await.unwrap());

        let (list, version): (Vec<i32>, Version) = store.get_json("list").await.unwrap().unwrap();
        assert_eq!(list, vec![1, 2, 3]);
        assert_eq!(version, Version::first());
    }

    #[tokio::test]
    async fn keys_with_prefix_filters() {
        let store = InMemoryStateStore::new();
        for key in ["a:1", "a:2", "b:1"] {
            store
                .put(key, serde_json::json!(true), PutOptions::new())
                .await
                .unwrap();
        }
        assert_eq!(store.keys_with_prefix("a:").await, vec!["a:1", "a:2"]);
    }
}
