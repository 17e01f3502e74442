//! Bounded-channel [`Publisher`] and the checkpoint committer that
//! acknowledges what the downstream actually wrote.
//!
//! Records are handed to a downstream task through a bounded `mpsc` channel.
//! A full channel suspends `publish()` (backpressure), a dropped receiver is
//! reported as [`ConnectorError::Disconnected`]. Publishing only enqueues:
//! positions reach the registry through [`CheckpointCommitter::commit`],
//! called by the downstream once the records are written out.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use logtap_storage::CheckpointStore;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::checkpoint::EventLogCheckpoint;
use crate::connector::{Publisher, Record};
use crate::error::ConnectorError;

/// A published record tagged with the input it came from and the position
/// to acknowledge once it has been delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    /// Input (source) name.
    pub input: String,
    /// The record.
    pub record: Record,
    /// Position to persist after delivery.
    pub position: EventLogCheckpoint,
}

/// Publishes into a bounded channel.
#[derive(Debug)]
pub struct ChannelPublisher {
    /// Input name; also the registry key.
    input: String,
    tx: mpsc::Sender<PublishedRecord>,
}

impl ChannelPublisher {
    /// Creates a publisher for `input`.
    #[must_use]
    pub fn new(input: impl Into<String>, tx: mpsc::Sender<PublishedRecord>) -> Self {
        Self {
            input: input.into(),
            tx,
        }
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(
        &self,
        record: Record,
        position: EventLogCheckpoint,
    ) -> Result<(), ConnectorError> {
        self.tx
            .send(PublishedRecord {
                input: self.input.clone(),
                record,
                position,
            })
            .await
            .map_err(|_| ConnectorError::Disconnected("downstream receiver dropped".into()))
    }
}

/// Latest delivered position per input, waiting to be committed.
#[derive(Debug, Default)]
pub struct PendingAcks {
    positions: BTreeMap<String, EventLogCheckpoint>,
}

impl PendingAcks {
    /// Records that `published` has been delivered. A later record of the
    /// same input supersedes an earlier one.
    pub fn ack(&mut self, published: &PublishedRecord) {
        self.positions
            .insert(published.input.clone(), published.position.clone());
    }

    /// Number of inputs with an uncommitted position.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if nothing is waiting to be committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Persists delivered positions to the checkpoint registry.
///
/// Registry writes are synchronous file I/O, so they run on the blocking
/// pool rather than on a runtime worker.
#[derive(Clone)]
pub struct CheckpointCommitter {
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointCommitter {
    /// Creates a committer writing into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    /// Saves every pending position and returns how many were saved.
    ///
    /// A failed save is logged and skipped; the input keeps its previous
    /// position, so the worst case is a replay of delivered records after a
    /// restart.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ReadError`] only if the blocking task itself
    /// could not run to completion.
    pub async fn commit(&self, pending: PendingAcks) -> Result<usize, ConnectorError> {
        if pending.is_empty() {
            return Ok(0);
        }
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut saved = 0;
            for (input, position) in pending.positions {
                let value = match position.to_value() {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(input = %input, error = %e, "checkpoint serialization failed");
                        continue;
                    }
                };
                match store.save(&input, value) {
                    Ok(()) => {
                        trace!(input = %input, record_number = position.record_number, "checkpoint updated");
                        saved += 1;
                    }
                    Err(e) => warn!(input = %input, error = %e, "checkpoint update failed"),
                }
            }
            saved
        })
        .await
        .map_err(|e| ConnectorError::ReadError(format!("checkpoint commit task failed: {e}")))
    }
}

impl std::fmt::Debug for CheckpointCommitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointCommitter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtap_storage::InMemoryCheckpointStore;
    use std::time::Duration;

    fn position(n: u64) -> EventLogCheckpoint {
        EventLogCheckpoint {
            name: "app".into(),
            record_number: n,
            byte_offset: n * 10,
            timestamp_ms: None,
        }
    }

    fn saved(store: &InMemoryCheckpointStore, key: &str) -> Option<EventLogCheckpoint> {
        store
            .load(key)
            .unwrap()
            .map(|v| EventLogCheckpoint::from_value(v).unwrap())
    }

    #[tokio::test]
    async fn test_publish_enqueues_without_checkpointing() {
        let (tx, mut rx) = mpsc::channel(4);
        let publisher = ChannelPublisher::new("app", tx);

        let record = Record::new("app.log", "hello", position(1));
        publisher.publish(record.clone(), position(1)).await.unwrap();

        let got = rx.recv().await.unwrap();
        assert_eq!(got.input, "app");
        assert_eq!(got.record, record);
        assert_eq!(got.position, position(1));
    }

    #[tokio::test]
    async fn test_commit_saves_latest_position_per_input() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let committer = CheckpointCommitter::new(Arc::clone(&store) as Arc<dyn CheckpointStore>);
        let published = |input: &str, n: u64| PublishedRecord {
            input: input.into(),
            record: Record::new("app.log", "x", position(n)),
            position: position(n),
        };

        let mut pending = PendingAcks::default();
        pending.ack(&published("app", 1));
        pending.ack(&published("app", 2));
        pending.ack(&published("sys", 7));
        assert_eq!(pending.len(), 2);

        assert_eq!(committer.commit(pending).await.unwrap(), 2);
        assert_eq!(saved(&store, "app"), Some(position(2)));
        assert_eq!(saved(&store, "sys"), Some(position(7)));
        assert_eq!(committer.commit(PendingAcks::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_disconnect() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let publisher = ChannelPublisher::new("app", tx);

        let err = publisher
            .publish(Record::new("app.log", "x", position(1)), position(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Disconnected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_channel_applies_backpressure() {
        let (tx, mut rx) = mpsc::channel(1);
        let publisher = ChannelPublisher::new("app", tx);

        publisher
            .publish(Record::new("app.log", "first", position(1)), position(1))
            .await
            .unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_secs(1),
            publisher.publish(Record::new("app.log", "second", position(2)), position(2)),
        )
        .await;
        assert!(blocked.is_err(), "second publish should wait for capacity");

        assert_eq!(rx.recv().await.unwrap().record.raw, "first");
        publisher
            .publish(Record::new("app.log", "second", position(2)), position(2))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().record.raw, "second");
    }
}
