//! The event log runner state machine.
//!
//! ```text
//!            ┌──── recoverable / channel not found (wait 5s) ────┐
//!            ▼                                                    │
//!  start ─▶ Opening ──ok──▶ Reading ──records──▶ Publishing ──┐   │
//!            ▲                │  │                           │   │
//!            │                │  └──empty──▶ Waiting (1s) ───┤   │
//!            │                │                  ▲           │   │
//!            │                │                  └───────────┘   │
//!            └── reset, reopen┘ (recoverable read fault)         │
//!                                                                │
//!  anything else, end of stream, cancellation ─▶ Closing ◀───────┘
//! ```
//!
//! Every suspension point (open, read, reset, publish, both waits) races the
//! cancellation token, so shutdown never waits on a blocked call. The
//! in-flight future is dropped and the source is closed once, after the
//! loop, on every exit path.

use std::sync::Arc;
use std::time::Duration;

use logtap_connectors::{ConnectorError, Cursor, EventLogCheckpoint, EventSource, Publisher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::metrics::RunnerMetrics;
use crate::policy::{classify, ErrorClass};
use crate::status::{RunnerState, StatusSink};

const CHANNEL_NOT_FOUND: &str = "event log channel not found";
const READ_ERROR: &str = "error occurred while reading from event log";
const RESET_ERROR: &str = "error resetting event log handle";
const PUBLISH_ERROR: &str = "error occurred while publishing from event log";

/// Drives one event source from its last checkpoint until it is exhausted,
/// fails terminally, or is cancelled.
#[derive(Debug, Clone, Default)]
pub struct EventLogRunner {
    config: RunnerConfig,
    metrics: Arc<RunnerMetrics>,
}

impl EventLogRunner {
    /// Creates a runner with its own metrics.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            metrics: Arc::default(),
        }
    }

    /// Reports into `metrics` instead of a private instance.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<RunnerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the runner's configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Returns the runner's metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<RunnerMetrics> {
        &self.metrics
    }

    /// Reads `source` from the position `cursor` reports and hands every
    /// record to `publisher`, in order.
    ///
    /// Recoverable and channel-not-found conditions are retried
    /// indefinitely. Returns `Ok(())` when an archived source reaches its
    /// end or `cancel` fires. `source.close()` is called exactly once before
    /// returning.
    ///
    /// # Errors
    ///
    /// [`RunnerError::Open`] or [`RunnerError::Read`] for non-retryable
    /// source failures, [`RunnerError::PublishDisconnect`] if the publisher
    /// refuses a record. Status is set to Degraded first in every case.
    pub async fn run(
        &self,
        source: &mut dyn EventSource,
        cursor: &dyn Cursor,
        publisher: &dyn Publisher,
        status: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<(), RunnerError> {
        let name = source.name().to_string();
        let channel = source.channel().to_string();
        status.update_status(RunnerState::Running, "");

        let result = Session {
            runner: self,
            source: &mut *source,
            cursor,
            publisher,
            status,
            cancel,
            name: &name,
            channel: &channel,
            channel_not_found_reported: false,
        }
        .run()
        .await;

        if let Err(err) = source.close().await {
            error!(eventlog = %name, channel = %channel, error = %err, "error while closing event log access");
        } else {
            debug!(eventlog = %name, channel = %channel, "event log closed");
        }
        result
    }

    /// Opens `source` with an empty checkpoint and closes it again, without
    /// reading. Used to validate configuration offline.
    ///
    /// # Errors
    ///
    /// [`RunnerError::SelfTest`] if the source cannot be opened,
    /// [`RunnerError::Close`] if it cannot be closed afterwards.
    pub async fn test(source: &mut dyn EventSource) -> Result<(), RunnerError> {
        if let Err(err) = source.open(&EventLogCheckpoint::default()).await {
            return Err(RunnerError::SelfTest {
                channel: source.channel().to_string(),
                source: err,
            });
        }
        source.close().await.map_err(|err| RunnerError::Close {
            channel: source.channel().to_string(),
            source: err,
        })
    }
}

/// Where the read loop goes after a failed read.
enum AfterReadFault {
    Reopen,
    Stop,
}

/// State of one `run()` call.
struct Session<'a> {
    runner: &'a EventLogRunner,
    source: &'a mut dyn EventSource,
    cursor: &'a dyn Cursor,
    publisher: &'a dyn Publisher,
    status: &'a dyn StatusSink,
    cancel: &'a CancellationToken,
    name: &'a str,
    channel: &'a str,
    /// Set after a channel-not-found open failure has been logged at error
    /// level; repeats go to debug until an open succeeds.
    channel_not_found_reported: bool,
}

impl Session<'_> {
    async fn run(&mut self) -> Result<(), RunnerError> {
        let cancel = self.cancel;
        let metrics = Arc::clone(&self.runner.metrics);

        'open: loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let checkpoint = init_checkpoint(self.cursor, self.name, self.channel);
            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                result = self.source.open(&checkpoint) => result,
            };
            if let Err(err) = opened {
                metrics.record_open_failure();
                self.open_failed(err).await?;
                continue;
            }
            self.channel_not_found_reported = false;
            metrics.record_open();
            self.status.update_status(RunnerState::Running, "");
            debug!(
                eventlog = %self.name,
                channel = %self.channel,
                record_number = checkpoint.record_number,
                "event log opened"
            );

            while !cancel.is_cancelled() {
                let read = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Ok(()),
                    result = self.source.read() => result,
                };
                let records = match read {
                    Ok(records) => records,
                    Err(err) => match self.read_failed(err).await? {
                        AfterReadFault::Reopen => {
                            metrics.record_reopen();
                            continue 'open;
                        }
                        AfterReadFault::Stop => return Ok(()),
                    },
                };
                metrics.record_read(records.len());

                if records.is_empty() {
                    wait(cancel, self.runner.config.poll_interval).await;
                    continue;
                }

                for record in records {
                    let position = record.position.clone();
                    let published = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Ok(()),
                        result = self.publisher.publish(record, position) => result,
                    };
                    if let Err(err) = published {
                        error!(eventlog = %self.name, channel = %self.channel, error = %err, "{}", PUBLISH_ERROR);
                        self.status
                            .update_status(RunnerState::Degraded, &format!("{PUBLISH_ERROR}: {err}"));
                        return Err(RunnerError::PublishDisconnect(err));
                    }
                    metrics.record_published();
                }
            }
            return Ok(());
        }
    }

    /// Handles a failed `open()`: waits and returns `Ok` if it should be
    /// retried, returns the terminal error otherwise.
    async fn open_failed(&mut self, err: ConnectorError) -> Result<(), RunnerError> {
        match classify(&err, self.source.is_file()) {
            ErrorClass::Recoverable => {
                error!(eventlog = %self.name, channel = %self.channel, error = %err, "recoverable error when opening event log");
            }
            ErrorClass::ChannelNotFound => {
                if self.channel_not_found_reported {
                    debug!(eventlog = %self.name, channel = %self.channel, error = %err, "{}", CHANNEL_NOT_FOUND);
                } else {
                    error!(eventlog = %self.name, channel = %self.channel, error = %err, "{}", CHANNEL_NOT_FOUND);
                }
                self.channel_not_found_reported = true;
                self.status
                    .update_status(RunnerState::Degraded, &format!("{CHANNEL_NOT_FOUND}: {err}"));
            }
            _ => {
                error!(eventlog = %self.name, channel = %self.channel, error = %err, "failed to open event log");
                self.status.update_status(
                    RunnerState::Degraded,
                    &format!("failed to open event log channel {:?}: {err}", self.channel),
                );
                return Err(RunnerError::Open {
                    channel: self.channel.to_string(),
                    source: err,
                });
            }
        }
        wait(self.cancel, self.runner.config.open_retry_interval).await;
        Ok(())
    }

    /// Handles a failed `read()`.
    async fn read_failed(&mut self, err: ConnectorError) -> Result<AfterReadFault, RunnerError> {
        match classify(&err, self.source.is_file()) {
            ErrorClass::Recoverable => {
                error!(eventlog = %self.name, channel = %self.channel, error = %err, "recoverable error when reading from event log");
                self.reset().await;
                Ok(AfterReadFault::Reopen)
            }
            ErrorClass::ChannelNotFound => {
                error!(eventlog = %self.name, channel = %self.channel, error = %err, "channel not found when reading from event log");
                self.reset().await;
                Ok(AfterReadFault::Reopen)
            }
            ErrorClass::EndOfStream => {
                debug!(eventlog = %self.name, channel = %self.channel, "end of event stream reached");
                Ok(AfterReadFault::Stop)
            }
            // The source was closed underneath a read by shutdown.
            _ if self.cancel.is_cancelled() => {
                debug!(eventlog = %self.name, channel = %self.channel, error = %err, "read interrupted by shutdown");
                Ok(AfterReadFault::Stop)
            }
            _ => {
                error!(eventlog = %self.name, channel = %self.channel, error = %err, "{}", READ_ERROR);
                self.status
                    .update_status(RunnerState::Degraded, &format!("{READ_ERROR}: {err}"));
                Err(RunnerError::Read {
                    channel: self.channel.to_string(),
                    source: err,
                })
            }
        }
    }

    /// Attempts in-place recovery. A failure only degrades status; the
    /// caller reopens either way.
    async fn reset(&mut self) {
        let cancel = self.cancel;
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            result = self.source.reset() => result,
        };
        self.runner.metrics.record_reset(result.is_ok());
        if let Err(err) = result {
            error!(eventlog = %self.name, channel = %self.channel, error = %err, "{}", RESET_ERROR);
            self.status
                .update_status(RunnerState::Degraded, &format!("{RESET_ERROR}: {err}"));
        }
    }
}

/// Sleeps for `period` or until cancelled.
async fn wait(cancel: &CancellationToken, period: Duration) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(period) => {}
    }
}

/// Returns the position to open at. A missing checkpoint is the start of the
/// source; an unreadable one is logged and also treated as the start.
fn init_checkpoint(cursor: &dyn Cursor, name: &str, channel: &str) -> EventLogCheckpoint {
    if cursor.is_new() {
        return EventLogCheckpoint::default();
    }
    match cursor.unpack() {
        Ok(checkpoint) => checkpoint,
        Err(err) => {
            error!(eventlog = %name, channel = %channel, error = %err, "failed to read checkpoint from registry, resetting position");
            EventLogCheckpoint::default()
        }
    }
}
