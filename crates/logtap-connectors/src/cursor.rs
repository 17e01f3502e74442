//! [`Cursor`] backed by a [`CheckpointStore`] key.

use std::sync::Arc;

use logtap_storage::CheckpointStore;
use tracing::warn;

use crate::checkpoint::EventLogCheckpoint;
use crate::connector::Cursor;
use crate::error::ConnectorError;

/// Reads an input's position from the checkpoint registry.
///
/// The store is consulted on every call, so a reopen after a publish sees
/// the newest acknowledged position.
pub struct StoreCursor {
    store: Arc<dyn CheckpointStore>,
    key: String,
}

impl StoreCursor {
    /// Creates a cursor over `key` in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Returns the registry key this cursor reads.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Cursor for StoreCursor {
    fn is_new(&self) -> bool {
        match self.store.load(&self.key) {
            Ok(value) => value.is_none(),
            Err(e) => {
                // Not new: let `unpack` surface the failure.
                warn!(key = %self.key, error = %e, "failed to probe checkpoint registry");
                false
            }
        }
    }

    fn unpack(&self) -> Result<EventLogCheckpoint, ConnectorError> {
        match self.store.load(&self.key)? {
            Some(value) => Ok(EventLogCheckpoint::from_value(value)?),
            None => Ok(EventLogCheckpoint::default()),
        }
    }
}

impl std::fmt::Debug for StoreCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCursor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtap_storage::InMemoryCheckpointStore;
    use serde_json::json;

    #[test]
    fn test_new_key() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let cursor = StoreCursor::new(store, "app");
        assert!(cursor.is_new());
        assert_eq!(cursor.unpack().unwrap(), EventLogCheckpoint::default());
    }

    #[test]
    fn test_unpack_reads_latest_value() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let cursor = StoreCursor::new(Arc::clone(&store) as Arc<dyn CheckpointStore>, "app");

        store
            .save("app", json!({ "name": "app", "record_number": 1, "byte_offset": 10 }))
            .unwrap();
        assert!(!cursor.is_new());
        assert_eq!(cursor.unpack().unwrap().record_number, 1);

        store
            .save("app", json!({ "name": "app", "record_number": 2, "byte_offset": 20 }))
            .unwrap();
        assert_eq!(cursor.unpack().unwrap().byte_offset, 20);
    }

    #[test]
    fn test_corrupt_value_fails_unpack() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        store.save("app", json!([1, 2, 3])).unwrap();
        let cursor = StoreCursor::new(store, "app");
        assert!(!cursor.is_new());
        assert!(matches!(cursor.unpack(), Err(ConnectorError::Serde(_))));
    }
}
