//! Test doubles for the connector traits.
//!
//! [`ScriptedSource`] plays back pre-recorded open/read/reset outcomes and
//! counts every call; [`RecordingPublisher`] captures what was published and
//! can be told to fail; [`StaticCursor`] reports a fixed position.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::checkpoint::EventLogCheckpoint;
use crate::connector::{Cursor, EventSource, Publisher, Record};
use crate::error::ConnectorError;

/// Builds a record at `record_number` for `name`.
#[must_use]
pub fn record(name: &str, record_number: u64) -> Record {
    Record::new(
        name,
        format!("event {record_number}"),
        EventLogCheckpoint {
            name: name.to_string(),
            record_number,
            byte_offset: record_number * 10,
            timestamp_ms: None,
        },
    )
}

/// One scripted outcome of [`EventSource::read`].
#[derive(Debug)]
pub enum ReadStep {
    /// Return this batch (possibly empty).
    Batch(Vec<Record>),
    /// Return this error.
    Fail(ConnectorError),
    /// Never complete, like a read blocked on an idle channel.
    Block,
}

/// One scripted outcome of [`EventSource::open`].
#[derive(Debug)]
enum OpenStep {
    Done(Result<(), ConnectorError>),
    Block,
}

/// Call counters shared between a [`ScriptedSource`] and the test.
#[derive(Debug, Default)]
pub struct SourceCalls {
    opens: AtomicUsize,
    reads: AtomicUsize,
    resets: AtomicUsize,
    closes: AtomicUsize,
    opened_with: Mutex<Vec<EventLogCheckpoint>>,
}

impl SourceCalls {
    /// Number of `open()` calls.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of `read()` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `reset()` calls.
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Number of `close()` calls.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Checkpoints passed to each `open()` call, in order.
    pub fn opened_with(&self) -> Vec<EventLogCheckpoint> {
        self.opened_with.lock().clone()
    }
}

/// [`EventSource`] that plays back scripted outcomes.
///
/// Exhausted scripts fall back to: `open()` succeeds, `reset()` succeeds,
/// `read()` blocks forever.
#[derive(Debug)]
pub struct ScriptedSource {
    name: String,
    is_file: bool,
    opens: VecDeque<OpenStep>,
    reads: VecDeque<ReadStep>,
    resets: VecDeque<Result<(), ConnectorError>>,
    calls: Arc<SourceCalls>,
}

impl ScriptedSource {
    /// A live-channel source.
    #[must_use]
    pub fn live(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_file: false,
            opens: VecDeque::new(),
            reads: VecDeque::new(),
            resets: VecDeque::new(),
            calls: Arc::new(SourceCalls::default()),
        }
    }

    /// An archived (file-backed) source.
    #[must_use]
    pub fn file(name: &str) -> Self {
        Self {
            is_file: true,
            ..Self::live(name)
        }
    }

    /// Queues the outcome of the next unscripted `open()`.
    #[must_use]
    pub fn with_open(mut self, result: Result<(), ConnectorError>) -> Self {
        self.opens.push_back(OpenStep::Done(result));
        self
    }

    /// Makes the next unscripted `open()` never complete, like an open
    /// stuck on an unresponsive service.
    #[must_use]
    pub fn with_open_blocking(mut self) -> Self {
        self.opens.push_back(OpenStep::Block);
        self
    }

    /// Queues the outcome of the next unscripted `read()`.
    #[must_use]
    pub fn with_read(mut self, step: ReadStep) -> Self {
        self.reads.push_back(step);
        self
    }

    /// Queues the outcome of the next unscripted `reset()`.
    #[must_use]
    pub fn with_reset(mut self, result: Result<(), ConnectorError>) -> Self {
        self.resets.push_back(result);
        self
    }

    /// Returns the shared call counters.
    #[must_use]
    pub fn calls(&self) -> Arc<SourceCalls> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn open(&mut self, checkpoint: &EventLogCheckpoint) -> Result<(), ConnectorError> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        self.calls.opened_with.lock().push(checkpoint.clone());
        match self.opens.pop_front() {
            Some(OpenStep::Done(result)) => result,
            Some(OpenStep::Block) => std::future::pending().await,
            None => Ok(()),
        }
    }

    async fn read(&mut self) -> Result<Vec<Record>, ConnectorError> {
        self.calls.reads.fetch_add(1, Ordering::SeqCst);
        match self.reads.pop_front().unwrap_or(ReadStep::Block) {
            ReadStep::Batch(records) => Ok(records),
            ReadStep::Fail(err) => Err(err),
            ReadStep::Block => std::future::pending().await,
        }
    }

    async fn reset(&mut self) -> Result<(), ConnectorError> {
        self.calls.resets.fetch_add(1, Ordering::SeqCst);
        self.resets.pop_front().unwrap_or(Ok(()))
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_file(&self) -> bool {
        self.is_file
    }

    fn channel(&self) -> &str {
        &self.name
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// [`Publisher`] that records every accepted record.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(Record, EventLogCheckpoint)>>,
    attempts: AtomicUsize,
    fail_at: Option<usize>,
    block: bool,
}

impl RecordingPublisher {
    /// A publisher that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher whose `n`-th call (0-based) and every later call fails
    /// with [`ConnectorError::Disconnected`].
    #[must_use]
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::default()
        }
    }

    /// A publisher that never completes, like a downstream that stopped
    /// draining its queue.
    #[must_use]
    pub fn blocking() -> Self {
        Self {
            block: true,
            ..Self::default()
        }
    }

    /// Records accepted so far, with the positions they were published at.
    pub fn published(&self) -> Vec<(Record, EventLogCheckpoint)> {
        self.published.lock().clone()
    }

    /// Number of `publish()` calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        record: Record,
        position: EventLogCheckpoint,
    ) -> Result<(), ConnectorError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.block {
            std::future::pending::<()>().await;
        }
        if self.fail_at.is_some_and(|n| attempt >= n) {
            return Err(ConnectorError::Disconnected("recording publisher closed".into()));
        }
        self.published.lock().push((record, position));
        Ok(())
    }
}

/// [`Cursor`] with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticCursor {
    checkpoint: Option<EventLogCheckpoint>,
    corrupt: bool,
}

impl StaticCursor {
    /// A cursor that has never been written.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor holding `checkpoint`.
    #[must_use]
    pub fn at(checkpoint: EventLogCheckpoint) -> Self {
        Self {
            checkpoint: Some(checkpoint),
            corrupt: false,
        }
    }

    /// A cursor whose stored value cannot be parsed.
    #[must_use]
    pub fn corrupt() -> Self {
        Self {
            checkpoint: None,
            corrupt: true,
        }
    }
}

impl Cursor for StaticCursor {
    fn is_new(&self) -> bool {
        self.checkpoint.is_none() && !self.corrupt
    }

    fn unpack(&self) -> Result<EventLogCheckpoint, ConnectorError> {
        if self.corrupt {
            return Err(ConnectorError::ReadError("checkpoint is not valid JSON".into()));
        }
        Ok(self.checkpoint.clone().unwrap_or_default())
    }
}
