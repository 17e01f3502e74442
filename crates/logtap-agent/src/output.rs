//! Newline-delimited JSON output of published records.
//!
//! Positions are committed only after the lines carrying them have been
//! written and flushed. Records already queued when a write fails are never
//! acknowledged and are read again after a restart.

use logtap_connectors::{CheckpointCommitter, PendingAcks, PublishedRecord};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::warn;

/// Most records written between two flushes.
const MAX_BATCH: u64 = 256;

#[derive(Serialize)]
struct OutputLine<'a> {
    input: &'a str,
    channel: &'a str,
    message: &'a str,
    record_number: u64,
    byte_offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp_ms: Option<i64>,
}

/// Encodes one record as a single JSON line (without the newline).
pub fn encode(published: &PublishedRecord) -> serde_json::Result<String> {
    let record = &published.record;
    serde_json::to_string(&OutputLine {
        input: &published.input,
        channel: &record.channel,
        message: &record.raw,
        record_number: published.position.record_number,
        byte_offset: published.position.byte_offset,
        timestamp_ms: published.position.timestamp_ms,
    })
}

/// Writes every record from `rx` to `out` until all senders are dropped,
/// committing positions after each flushed batch. Returns the number of
/// records written.
pub async fn write_records<W>(
    mut rx: mpsc::Receiver<PublishedRecord>,
    mut out: W,
    committer: CheckpointCommitter,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(first) = rx.recv().await {
        let mut pending = PendingAcks::default();
        let mut next = Some(first);
        let mut batch = 0u64;
        while let Some(published) = next.take() {
            let mut line = encode(&published)?;
            line.push('\n');
            out.write_all(line.as_bytes()).await?;
            pending.ack(&published);
            batch += 1;
            if batch < MAX_BATCH {
                next = rx.try_recv().ok();
            }
        }
        out.flush().await?;
        written += batch;

        if let Err(e) = committer.commit(pending).await {
            warn!(error = %e, "failed to commit delivered positions");
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtap_connectors::{EventLogCheckpoint, Record};
    use logtap_storage::{CheckpointStore, InMemoryCheckpointStore};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    fn published(input: &str, raw: &str, n: u64) -> PublishedRecord {
        let position = EventLogCheckpoint {
            name: input.into(),
            record_number: n,
            byte_offset: n * 8,
            timestamp_ms: Some(1_700_000_000_000),
        };
        PublishedRecord {
            input: input.into(),
            record: Record::new("/var/log/app.log", raw, position.clone()),
            position,
        }
    }

    fn committer() -> (Arc<InMemoryCheckpointStore>, CheckpointCommitter) {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let committer = CheckpointCommitter::new(Arc::clone(&store) as Arc<dyn CheckpointStore>);
        (store, committer)
    }

    fn saved_record_number(store: &InMemoryCheckpointStore, input: &str) -> Option<u64> {
        store
            .load(input)
            .unwrap()
            .map(|v| EventLogCheckpoint::from_value(v).unwrap().record_number)
    }

    /// Output whose every write fails, like a closed stdout pipe.
    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_encode() {
        let line = encode(&published("app", "say \"hi\"", 2)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["input"], "app");
        assert_eq!(value["channel"], "/var/log/app.log");
        assert_eq!(value["message"], "say \"hi\"");
        assert_eq!(value["record_number"], 2);
        assert_eq!(value["byte_offset"], 16);
        assert_eq!(value["timestamp_ms"], 1_700_000_000_000_i64);
    }

    #[tokio::test]
    async fn test_write_records_commits_after_writing() {
        let (store, committer) = committer();
        let (tx, rx) = mpsc::channel(4);
        tx.send(published("app", "one", 1)).await.unwrap();
        tx.send(published("app", "two", 2)).await.unwrap();
        tx.send(published("sys", "boot", 9)).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        let written = write_records(rx, &mut out, committer).await.unwrap();
        assert_eq!(written, 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("\"message\":\"two\""));
        assert_eq!(saved_record_number(&store, "app"), Some(2));
        assert_eq!(saved_record_number(&store, "sys"), Some(9));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_queued_records_unacknowledged() {
        let (store, committer) = committer();
        let (tx, rx) = mpsc::channel(4);
        for n in 1..=3 {
            tx.send(published("app", "line", n)).await.unwrap();
        }
        drop(tx);

        let err = write_records(rx, BrokenPipe, committer).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        assert_eq!(saved_record_number(&store, "app"), None);
    }
}
