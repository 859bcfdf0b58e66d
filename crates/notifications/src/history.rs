//! Append-only record of dispatch attempts.

use chrono::{DateTime, Utc};
use common::EventId;
use serde::{Deserialize, Serialize};
use state_store::{PutOptions, StateStore, StateStoreExt};
use uuid::Uuid;

use crate::{Channel, Result};

/// How a single channel send ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Sent,
    Failed,
    TimedOut,
}

/// One channel's part of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAttempt {
    pub channel: Channel,
    pub recipient: String,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelAttempt {
    pub fn is_sent(&self) -> bool {
        self.outcome == AttemptOutcome::Sent
    }
}

/// What happened when one bus event was dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationHistoryEntry {
    /// Unique per dispatch, not per source event.
    pub id: String,

    /// The bus event this entry answers.
    pub source_event_id: EventId,

    pub event_type: String,

    /// Order or product the event was about.
    pub entity_id: String,

    pub channels: Vec<ChannelAttempt>,

    /// Business fields worth keeping (amounts, status, quantity).
    pub metadata: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl NotificationHistoryEntry {
    /// Generates a fresh history ID.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn new(
        id: impl Into<String>,
        source_event_id: EventId,
        event_type: impl Into<String>,
        entity_id: impl Into<String>,
        channels: Vec<ChannelAttempt>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            source_event_id,
            event_type: event_type.into(),
            entity_id: entity_id.into(),
            channels,
            metadata,
            timestamp: Utc::now(),
        }
    }
}

/// Result of claiming a source event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// Another dispatch already claimed this source event under the given
    /// history ID.
    AlreadyClaimed(String),
}

fn entry_key(id: &str) -> String {
    format!("notification_history:{id}")
}

fn event_key(event_id: EventId) -> String {
    format!("notification_event:{event_id}")
}

/// History entries kept in the state store.
///
/// Entries live under `notification_history:<id>`; the key
/// `notification_event:<event_id>` maps a source event to its entry. That
/// claim is written insert-if-absent before anything is sent, so at most one
/// dispatch ever proceeds per source event.
#[derive(Clone)]
pub struct HistoryStore<S: StateStore> {
    store: S,
}

impl<S: StateStore> HistoryStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the history ID recorded for a source event, if any.
    pub async fn find_by_event(&self, event_id: EventId) -> Result<Option<String>> {
        Ok(self
            .store
            .get_json::<String>(&event_key(event_id))
            .await?
            .map(|(id, _)| id))
    }

    pub async fn get(&self, id: &str) -> Result<Option<NotificationHistoryEntry>> {
        Ok(self
            .store
            .get_json::<NotificationHistoryEntry>(&entry_key(id))
            .await?
            .map(|(entry, _)| entry))
    }

    /// Reserves `event_id` for the dispatch identified by `history_id`.
    ///
    /// Only the first caller for an event gets [`ClaimOutcome::Claimed`];
    /// everyone else learns which history ID won.
    pub async fn claim(&self, event_id: EventId, history_id: &str) -> Result<ClaimOutcome> {
        let claim = self
            .store
            .put_json(&event_key(event_id), history_id, PutOptions::expect_new())
            .await;

        match claim {
            Ok(_) => Ok(ClaimOutcome::Claimed),
            Err(e) if e.is_conflict() => {
                let existing = self.find_by_event(event_id).await?.unwrap_or_default();
                Ok(ClaimOutcome::AlreadyClaimed(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stores the entry for a dispatch whose event was already claimed.
    pub async fn write_entry(&self, entry: &NotificationHistoryEntry) -> Result<()> {
        self.store
            .put_json(&entry_key(&entry.id), entry, PutOptions::expect_new())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use state_store::InMemoryStateStore;

    fn entry(event_id: EventId) -> NotificationHistoryEntry {
        NotificationHistoryEntry::new(
            NotificationHistoryEntry::new_id(),
            event_id,
            "order.created",
            "o-1",
            vec![ChannelAttempt {
                channel: Channel::Email,
                recipient: "c1@example.com".to_string(),
                outcome: AttemptOutcome::Sent,
                error: None,
            }],
            serde_json::json!({ "total_amount": 75.48 }),
        )
    }

    #[tokio::test]
    async fn claim_write_then_find() {
        let store = InMemoryStateStore::new();
        let history = HistoryStore::new(store.clone());
        let event_id = EventId::new();
        let entry = entry(event_id);

        assert_eq!(history.find_by_event(event_id).await.unwrap(), None);
        assert_eq!(
            history.claim(event_id, &entry.id).await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            history.find_by_event(event_id).await.unwrap(),
            Some(entry.id.clone())
        );
        assert_eq!(history.get(&entry.id).await.unwrap(), None);

        history.write_entry(&entry).await.unwrap();

        assert_eq!(history.get(&entry.id).await.unwrap(), Some(entry.clone()));
        assert_eq!(
            store.keys_with_prefix("notification_history:").await,
            vec![format!("notification_history:{}", entry.id)]
        );
    }

    #[tokio::test]
    async fn second_claim_for_same_event_is_rejected() {
        let history = HistoryStore::new(InMemoryStateStore::new());
        let event_id = EventId::new();

        history.claim(event_id, "first").await.unwrap();
        let outcome = history.claim(event_id, "second").await.unwrap();

        assert_eq!(outcome, ClaimOutcome::AlreadyClaimed("first".to_string()));
        assert_eq!(
            history.find_by_event(event_id).await.unwrap().as_deref(),
            Some("first")
        );
    }

    #[tokio::test]
    async fn claim_failure_propagates() {
        let store = InMemoryStateStore::new();
        store.set_fail_on_put(true);
        let history = HistoryStore::new(store);

        assert!(history.claim(EventId::new(), "h-1").await.is_err());
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = InMemoryStateStore::new();
        store.set_fail_on_get(true);
        let history = HistoryStore::new(store);

        assert!(history.find_by_event(EventId::new()).await.is_err());
    }

    #[test]
    fn entry_serialization_shape() {
        let json = serde_json::to_value(entry(EventId::new())).unwrap();
        assert_eq!(json["channels"][0]["channel"], "email");
        assert_eq!(json["channels"][0]["outcome"], "sent");
        assert!(json["channels"][0].get("error").is_none());
        assert_eq!(json["metadata"]["total_amount"], 75.48);
    }
}
