//! Integration test: the registry file stays consistent when several inputs
//! checkpoint through the same store concurrently.

use std::sync::Arc;

use logtap_storage::{CheckpointStore, FileSystemCheckpointStore};
use serde_json::json;

#[test]
fn test_concurrent_inputs_share_one_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let store = Arc::new(FileSystemCheckpointStore::open(&path).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|input| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for n in 1..=25u64 {
                    store
                        .save(&format!("input-{input}"), json!({ "record_number": n }))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reopened = FileSystemCheckpointStore::open(&path).unwrap();
    assert_eq!(reopened.keys().unwrap().len(), 4);
    for input in 0..4 {
        assert_eq!(
            reopened.load(&format!("input-{input}")).unwrap(),
            Some(json!({ "record_number": 25 }))
        );
    }
}

#[test]
fn test_registry_file_is_versioned_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let store = FileSystemCheckpointStore::open(&path).unwrap();
    store.save("security", json!({ "record_number": 3 })).unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["entries"]["security"]["record_number"], 3);
}
