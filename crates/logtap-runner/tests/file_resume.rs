//! End-to-end runs over real files: a file source, the checkpoint registry,
//! a store-backed cursor and a channel publisher.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use logtap_connectors::{
    ChannelPublisher, CheckpointCommitter, FileEventLog, FileEventLogConfig, PendingAcks,
    PublishedRecord, StoreCursor,
};
use logtap_runner::{EventLogRunner, RunnerConfig, RunnerState, WatchStatusSink};
use logtap_storage::{CheckpointStore, FileSystemCheckpointStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn fast_config() -> RunnerConfig {
    RunnerConfig {
        open_retry_interval: Duration::from_millis(20),
        poll_interval: Duration::from_millis(10),
    }
}

fn append(path: &Path, content: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

/// Runs an archived source to its end, acknowledges everything it
/// published and returns it.
async fn run_archived(log: &Path, registry: &Path) -> Vec<PublishedRecord> {
    let store: Arc<dyn CheckpointStore> = Arc::new(FileSystemCheckpointStore::open(registry).unwrap());
    let (tx, mut rx) = mpsc::channel(64);
    let publisher = ChannelPublisher::new("app", tx);
    let committer = CheckpointCommitter::new(Arc::clone(&store));
    let cursor = StoreCursor::new(store, "app");
    let mut source = FileEventLog::new(FileEventLogConfig::archived("app", log));
    let (status, _status_rx) = WatchStatusSink::new();

    EventLogRunner::new(fast_config())
        .run(&mut source, &cursor, &publisher, &status, &CancellationToken::new())
        .await
        .unwrap();
    drop(publisher);

    let mut published = Vec::new();
    let mut pending = PendingAcks::default();
    while let Some(record) = rx.recv().await {
        pending.ack(&record);
        published.push(record);
    }
    committer.commit(pending).await.unwrap();
    published
}

#[tokio::test]
async fn test_restart_resumes_after_last_published_record() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("app.log");
    let registry = dir.path().join("registry.json");

    append(&log, "one\ntwo\nthree\n");
    let first = run_archived(&log, &registry).await;
    let raw: Vec<_> = first.iter().map(|p| p.record.raw.as_str()).collect();
    assert_eq!(raw, ["one", "two", "three"]);

    append(&log, "four\nfive\n");
    let second = run_archived(&log, &registry).await;
    let raw: Vec<_> = second.iter().map(|p| p.record.raw.as_str()).collect();
    assert_eq!(raw, ["four", "five"]);
    assert_eq!(second[0].record.position.record_number, 4);
    assert_eq!(second[1].record.position.record_number, 5);
}

#[tokio::test]
async fn test_corrupt_registry_replays_from_start() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("app.log");
    let registry = dir.path().join("registry.json");

    append(&log, "one\ntwo\n");
    assert_eq!(run_archived(&log, &registry).await.len(), 2);

    std::fs::write(&registry, b"{ not json").unwrap();
    let replayed = run_archived(&log, &registry).await;
    assert_eq!(replayed.len(), 2);
    assert_eq!(replayed[0].record.raw, "one");
}

#[tokio::test]
async fn test_live_source_waits_for_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("late.log");
    let store: Arc<dyn CheckpointStore> =
        Arc::new(FileSystemCheckpointStore::open(dir.path().join("registry.json")).unwrap());

    let (tx, mut rx) = mpsc::channel(8);
    let (status, mut status_rx) = WatchStatusSink::new();
    let cancel = CancellationToken::new();

    let join = {
        let cancel = cancel.clone();
        let store = Arc::clone(&store);
        let log = log.clone();
        tokio::spawn(async move {
            let publisher = ChannelPublisher::new("late", tx);
            let cursor = StoreCursor::new(store, "late");
            let mut source = FileEventLog::new(FileEventLogConfig::live("late", log));
            EventLogRunner::new(fast_config())
                .run(&mut source, &cursor, &publisher, &status, &cancel)
                .await
        })
    };

    let degraded = tokio::time::timeout(
        Duration::from_secs(5),
        status_rx.wait_for(|s| s.state == RunnerState::Degraded),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert!(degraded.message.contains("not found"), "{}", degraded.message);

    append(&log, "hello\n");
    let published = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.record.raw, "hello");
    assert_eq!(status_rx.borrow().state, RunnerState::Running);

    cancel.cancel();
    join.await.unwrap().unwrap();
    assert!(store.load("late").unwrap().is_none());

    let mut pending = PendingAcks::default();
    pending.ack(&published);
    CheckpointCommitter::new(Arc::clone(&store)).commit(pending).await.unwrap();
    assert!(store.load("late").unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_undelivered_records_are_read_again() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("app.log");
    let registry = dir.path().join("registry.json");
    append(&log, "one\ntwo\nthree\n");

    // First run: the downstream takes every record but only writes "one".
    {
        let store: Arc<dyn CheckpointStore> =
            Arc::new(FileSystemCheckpointStore::open(&registry).unwrap());
        let (tx, mut rx) = mpsc::channel(64);
        let publisher = ChannelPublisher::new("app", tx);
        let cursor = StoreCursor::new(Arc::clone(&store), "app");
        let mut source = FileEventLog::new(FileEventLogConfig::archived("app", &log));
        let (status, _status_rx) = WatchStatusSink::new();

        EventLogRunner::new(fast_config())
            .run(&mut source, &cursor, &publisher, &status, &CancellationToken::new())
            .await
            .unwrap();
        drop(publisher);

        let first = rx.recv().await.unwrap();
        let mut pending = PendingAcks::default();
        pending.ack(&first);
        CheckpointCommitter::new(store).commit(pending).await.unwrap();
    }

    let replayed = run_archived(&log, &registry).await;
    let raw: Vec<_> = replayed.iter().map(|p| p.record.raw.as_str()).collect();
    assert_eq!(raw, ["two", "three"]);
}
