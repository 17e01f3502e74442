//! Checkpoint registry persistence.
//!
//! The [`CheckpointStore`] trait abstracts where input positions live so the
//! read path never needs to know whether they are kept on disk or in memory.
//! Values are opaque JSON documents keyed by input name; the connector layer
//! owns their shape.
//!
//! [`FileSystemCheckpointStore`] keeps every key in a single registry file and
//! rewrites it atomically (temp file + rename) on each change. A registry
//! that cannot be parsed at startup is moved aside and replaced by an empty
//! one: a damaged registry means "replay from the start", never "refuse to
//! start".

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Current on-disk registry format version.
const REGISTRY_VERSION: u32 = 1;

/// Errors from checkpoint persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointStoreError {
    /// Filesystem I/O error.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage for per-input checkpoint documents.
///
/// Implementations must be safe to share between the runners of several
/// inputs; each runner only ever touches its own key.
pub trait CheckpointStore: Send + Sync {
    /// Returns the checkpoint stored under `key`, or `None` if the key has
    /// never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn load(&self, key: &str) -> Result<Option<Value>, CheckpointStoreError>;

    /// Durably stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted. The previous value
    /// remains in effect in that case.
    fn save(&self, key: &str, value: Value) -> Result<(), CheckpointStoreError>;

    /// Removes `key`. Returns whether the key existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn remove(&self, key: &str) -> Result<bool, CheckpointStoreError>;

    /// Lists all stored keys in sorted order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn keys(&self) -> Result<Vec<String>, CheckpointStoreError>;
}

/// Borrowed view used when writing the registry.
#[derive(Serialize)]
struct RegistryFileRef<'a> {
    version: u32,
    entries: &'a BTreeMap<String, Value>,
}

/// Owned form used when reading the registry.
#[derive(Deserialize)]
struct RegistryFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, Value>,
}

/// [`CheckpointStore`] backed by a single JSON registry file.
#[derive(Debug)]
pub struct FileSystemCheckpointStore {
    /// Registry file path.
    path: PathBuf,
    /// In-memory copy of the registry; the file mirrors it after every write.
    entries: Mutex<BTreeMap<String, Value>>,
}

impl FileSystemCheckpointStore {
    /// Opens (or creates) the registry at `path`.
    ///
    /// Missing parent directories are created. A registry file that exists
    /// but does not parse is renamed to `<path>.corrupt` and the store
    /// starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// registry file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CheckpointStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<RegistryFile>(&bytes) {
                Ok(file) => {
                    debug!(path = %path.display(), entries = file.entries.len(), "loaded checkpoint registry");
                    file.entries
                }
                Err(e) => {
                    let aside = corrupt_path(&path);
                    warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "checkpoint registry is corrupt; starting from an empty registry"
                    );
                    if let Err(rename_err) = fs::rename(&path, &aside) {
                        warn!(error = %rename_err, "failed to move corrupt checkpoint registry aside");
                    }
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the registry file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<(), CheckpointStoreError> {
        let data = serde_json::to_vec_pretty(&RegistryFileRef {
            version: REGISTRY_VERSION,
            entries,
        })?;

        let tmp = tmp_path(&self.path);
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CheckpointStore for FileSystemCheckpointStore {
    fn load(&self, key: &str) -> Result<Option<Value>, CheckpointStoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: Value) -> Result<(), CheckpointStoreError> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), value);
        if let Err(e) = self.persist(&entries) {
            match previous {
                Some(prev) => entries.insert(key.to_string(), prev),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CheckpointStoreError> {
        let mut entries = self.entries.lock();
        let Some(previous) = entries.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>, CheckpointStoreError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

/// Non-durable [`CheckpointStore`] for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self, key: &str) -> Result<Option<Value>, CheckpointStoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: Value) -> Result<(), CheckpointStoreError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CheckpointStoreError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, CheckpointStoreError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".corrupt");
    PathBuf::from(s)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_open_missing_registry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemCheckpointStore::open(dir.path().join("registry.json")).unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert!(store.load("app").unwrap().is_none());
    }

    #[test]
    fn test_save_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("registry.json");

        let store = FileSystemCheckpointStore::open(&path).unwrap();
        store.save("app", json!({"record_number": 7})).unwrap();
        drop(store);

        let store = FileSystemCheckpointStore::open(&path).unwrap();
        assert_eq!(store.load("app").unwrap(), Some(json!({"record_number": 7})));
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_corrupt_registry_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, b"{ not json").unwrap();

        let store = FileSystemCheckpointStore::open(&path).unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert!(corrupt_path(&path).exists());

        store.save("app", json!(1)).unwrap();
        assert_eq!(store.load("app").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let store = FileSystemCheckpointStore::open(&path).unwrap();
        store.save("a", json!(1)).unwrap();
        store.save("b", json!(2)).unwrap();

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.keys().unwrap(), vec!["b".to_string()]);

        let reopened = FileSystemCheckpointStore::open(&path).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryCheckpointStore::new();
        store.save("z", json!("last")).unwrap();
        store.save("a", json!("first")).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a".to_string(), "z".to_string()]);
        assert_eq!(store.load("z").unwrap(), Some(json!("last")));
        assert!(store.remove("z").unwrap());
        assert!(store.load("z").unwrap().is_none());
    }
}
