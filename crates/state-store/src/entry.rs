use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version number of a stored key, used for optimistic concurrency control.
///
/// A key that has never been written is at version 0; the first write
/// produces version 1 and each subsequent write increments by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a key that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) produced by the first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A value read from the store together with its version.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    /// The key the value is stored under.
    pub key: String,

    /// The stored JSON value.
    pub value: serde_json::Value,

    /// The version of the key after the write that produced `value`.
    pub version: Version,

    /// When the value was last written.
    pub updated_at: DateTime<Utc>,
}

impl StateEntry {
    /// Returns true if the stored value carries no data.
    ///
    /// Stores backed by external systems may hand back an empty payload for a
    /// key that was never meaningfully written; callers treat it as absent.
    pub fn is_empty(&self) -> bool {
        match &self.value {
            serde_json::Value::Null => true,
            serde_json::Value::String(s) => s.is_empty(),
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}
