//! Signal journal
//!
//! Every signal is appended to the journal before it is delivered to an
//! instance. Entries stay pending until the instance acknowledges them, and
//! `seq` gives a total order across all instances.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_kernel::{DomainPort, PortError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

/// A journaled signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Journal sequence number, strictly increasing in append order
    pub seq: i64,
    /// Target instance
    pub instance_key: String,
    /// Signal name
    pub name: String,
    /// Signal payload
    pub payload: Value,
    /// Time the signal was accepted
    pub received_at: DateTime<Utc>,
}

impl Envelope {
    /// Decodes the payload into a typed signal.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Durable storage for signals
#[async_trait]
pub trait SignalJournal: DomainPort {
    /// Appends a signal and returns it with its assigned sequence number.
    async fn append(
        &self,
        instance_key: &str,
        name: &str,
        payload: Value,
        received_at: DateTime<Utc>,
    ) -> Result<Envelope, PortError>;

    /// Returns the unacknowledged signals of an instance in `seq` order.
    async fn pending(&self, instance_key: &str) -> Result<Vec<Envelope>, PortError>;

    /// Marks a signal as handled. Acknowledging twice is a no-op.
    async fn acknowledge(&self, seq: i64) -> Result<(), PortError>;

    /// Returns the keys of all instances with at least one pending signal.
    async fn instances_with_pending(&self) -> Result<Vec<String>, PortError>;
}

#[derive(Debug)]
struct JournalEntry {
    envelope: Envelope,
    acknowledged: bool,
}

#[derive(Debug, Default)]
struct JournalState {
    last_seq: i64,
    entries: BTreeMap<i64, JournalEntry>,
}

/// In-memory journal
///
/// Durable only for the lifetime of the process. Used by tests and embedded
/// setups.
#[derive(Debug, Default)]
pub struct InMemorySignalJournal {
    state: Mutex<JournalState>,
}

impl InMemorySignalJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries, acknowledged or not
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of entries not yet acknowledged
    pub async fn pending_count(&self) -> usize {
        self.state
            .lock()
            .await
            .entries
            .values()
            .filter(|entry| !entry.acknowledged)
            .count()
    }
}

impl DomainPort for InMemorySignalJournal {}

#[async_trait]
impl SignalJournal for InMemorySignalJournal {
    async fn append(
        &self,
        instance_key: &str,
        name: &str,
        payload: Value,
        received_at: DateTime<Utc>,
    ) -> Result<Envelope, PortError> {
        let mut state = self.state.lock().await;
        state.last_seq += 1;
        let envelope = Envelope {
            seq: state.last_seq,
            instance_key: instance_key.to_string(),
            name: name.to_string(),
            payload,
            received_at,
        };
        state.entries.insert(
            envelope.seq,
            JournalEntry {
                envelope: envelope.clone(),
                acknowledged: false,
            },
        );
        Ok(envelope)
    }

    async fn pending(&self, instance_key: &str) -> Result<Vec<Envelope>, PortError> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .filter(|entry| !entry.acknowledged && entry.envelope.instance_key == instance_key)
            .map(|entry| entry.envelope.clone())
            .collect())
    }

    async fn acknowledge(&self, seq: i64) -> Result<(), PortError> {
        let mut state = self.state.lock().await;
        match state.entries.get_mut(&seq) {
            Some(entry) => {
                entry.acknowledged = true;
                Ok(())
            }
            None => Err(PortError::not_found("Signal", seq)),
        }
    }

    async fn instances_with_pending(&self) -> Result<Vec<String>, PortError> {
        let state = self.state.lock().await;
        let keys: BTreeSet<String> = state
            .entries
            .values()
            .filter(|entry| !entry.acknowledged)
            .map(|entry| entry.envelope.instance_key.clone())
            .collect();
        Ok(keys.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pending_is_ordered_and_scoped() {
        let journal = InMemorySignalJournal::new();
        let now = Utc::now();

        let first = journal.append("bill-a", "add-item", json!({"n": 1}), now).await.unwrap();
        journal.append("bill-b", "add-item", json!({"n": 2}), now).await.unwrap();
        let third = journal.append("bill-a", "close-bill", json!({}), now).await.unwrap();

        assert!(first.seq < third.seq);

        let pending = journal.pending("bill-a").await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].seq, first.seq);
        assert_eq!(pending[1].name, "close-bill");
    }

    #[tokio::test]
    async fn test_acknowledge_removes_from_pending() {
        let journal = InMemorySignalJournal::new();
        let envelope = journal
            .append("bill-a", "close-bill", json!({}), Utc::now())
            .await
            .unwrap();

        journal.acknowledge(envelope.seq).await.unwrap();
        journal.acknowledge(envelope.seq).await.unwrap();

        assert!(journal.pending("bill-a").await.unwrap().is_empty());
        assert!(journal.instances_with_pending().await.unwrap().is_empty());
        assert_eq!(journal.len().await, 1);
    }

    #[tokio::test]
    async fn test_acknowledge_unknown_seq() {
        let journal = InMemorySignalJournal::new();
        let result = journal.acknowledge(42).await;
        assert!(matches!(result, Err(PortError::NotFound { .. })));
    }

    #[test]
    fn test_envelope_decode() {
        #[derive(Deserialize)]
        struct Payload {
            amount: i64,
        }

        let envelope = Envelope {
            seq: 1,
            instance_key: "bill-a".to_string(),
            name: "add-item".to_string(),
            payload: serde_json::json!({"amount": 250}),
            received_at: Utc::now(),
        };

        let payload: Payload = envelope.decode().unwrap();
        assert_eq!(payload.amount, 250);
    }
}
