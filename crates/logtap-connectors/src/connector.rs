//! Connector traits.
//!
//! The runner drives exactly one [`EventSource`] at a time, hands each record
//! it reads to a [`Publisher`], and resumes from whatever its [`Cursor`]
//! reports. Concrete adapters (file-backed, live tail, test fakes) all sit
//! behind these traits.
//!
//! # Source lifecycle
//!
//! 1. `open(checkpoint)`: establish (or re-establish) the read position
//! 2. `read()` in a loop: zero or more ordered records per call
//! 3. `reset()` after a recoverable read failure
//! 4. `close()` exactly once per runner exit
//!
//! The runner drops an in-flight `read()` future when it is cancelled and
//! then calls `close()`, so `read()` must not hold state that is only
//! consistent once the future completes.

use async_trait::async_trait;

use crate::checkpoint::EventLogCheckpoint;
use crate::error::ConnectorError;

/// A raw event plus the position just past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Channel the record was read from.
    pub channel: String,
    /// Undecoded event payload.
    pub raw: String,
    /// Position to persist once this record is accepted downstream.
    pub position: EventLogCheckpoint,
}

impl Record {
    /// Creates a record.
    #[must_use]
    pub fn new(
        channel: impl Into<String>,
        raw: impl Into<String>,
        position: EventLogCheckpoint,
    ) -> Self {
        Self {
            channel: channel.into(),
            raw: raw.into(),
            position,
        }
    }
}

/// Stateful handle to one event channel or archived log file.
#[async_trait]
pub trait EventSource: Send {
    /// Opens the source at `checkpoint`. Safe to call again after a failure
    /// or to re-establish an already open handle.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::Recoverable`] and [`ConnectorError::ChannelNotFound`]
    /// are retried by the runner; anything else stops it.
    async fn open(&mut self, checkpoint: &EventLogCheckpoint) -> Result<(), ConnectorError>;

    /// Reads the next batch of records in source order.
    ///
    /// An empty batch means no data is available right now.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::EndOfStream`] once an archived source is exhausted;
    /// other errors are classified by the runner.
    async fn read(&mut self) -> Result<Vec<Record>, ConnectorError>;

    /// Attempts in-place recovery after a recoverable read failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be recovered; the runner then
    /// reports degraded status and reopens anyway.
    async fn reset(&mut self) -> Result<(), ConnectorError>;

    /// Releases the handle. Must be safe on a never-opened source.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the handle fails.
    async fn close(&mut self) -> Result<(), ConnectorError>;

    /// Whether this is an archived (file-backed) source rather than a live
    /// channel.
    fn is_file(&self) -> bool;

    /// Channel identifier used in logs and status messages.
    fn channel(&self) -> &str;

    /// Source name; also the checkpoint key.
    fn name(&self) -> &str;
}

/// Downstream delivery of records.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Delivers `record` and acknowledges `position`.
    ///
    /// May suspend while downstream applies backpressure.
    ///
    /// # Errors
    ///
    /// Any error means downstream disconnected or refused delivery; the
    /// runner stops without retrying.
    async fn publish(
        &self,
        record: Record,
        position: EventLogCheckpoint,
    ) -> Result<(), ConnectorError>;
}

/// Read access to an input's last acknowledged position.
pub trait Cursor: Send + Sync {
    /// Returns `true` if no position has ever been stored.
    fn is_new(&self) -> bool;

    /// Returns the stored position.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored position cannot be read or parsed.
    fn unpack(&self) -> Result<EventLogCheckpoint, ConnectorError>;
}
