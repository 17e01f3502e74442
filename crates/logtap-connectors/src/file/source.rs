//! [`FileEventLog`] source implementation.

use std::io::SeekFrom;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info, warn};

use crate::checkpoint::EventLogCheckpoint;
use crate::connector::{EventSource, Record};
use crate::error::ConnectorError;

use super::config::{FileEventLogConfig, SourceMode};

/// Lifecycle state of the underlying file handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Never opened.
    Created,
    /// Open and readable.
    Open,
    /// Closed (or lost after a failed reopen).
    Closed,
}

impl std::fmt::Display for HandleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("Created"),
            Self::Open => f.write_str("Open"),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

/// Newline-delimited log file exposed as an [`EventSource`].
///
/// # Lifecycle
///
/// 1. Create with [`FileEventLog::new`]
/// 2. `open()` seeks to the checkpoint's byte offset
/// 3. `read()` returns up to `batch_size` complete lines per call
/// 4. `close()` drops the handle
pub struct FileEventLog {
    /// Parsed configuration.
    config: FileEventLogConfig,
    /// Path rendered once for logs and records.
    channel: String,
    /// Handle lifecycle state.
    state: HandleState,
    /// Buffered file handle (set during `open()`).
    reader: Option<BufReader<File>>,
    /// Position just past the last complete line consumed.
    position: EventLogCheckpoint,
    /// Bytes of a line whose terminating newline has not been read yet.
    pending: Vec<u8>,
}

impl FileEventLog {
    /// Creates a file source. Nothing is touched on disk until `open()`.
    #[must_use]
    pub fn new(config: FileEventLogConfig) -> Self {
        let channel = config.path.display().to_string();
        let position = EventLogCheckpoint::new(config.name.clone());
        Self {
            config,
            channel,
            state: HandleState::Created,
            reader: None,
            position,
            pending: Vec::new(),
        }
    }

    /// Returns the handle state.
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Returns the position just past the last line read.
    #[must_use]
    pub fn position(&self) -> &EventLogCheckpoint {
        &self.position
    }

    /// Returns the source configuration.
    #[must_use]
    pub fn config(&self) -> &FileEventLogConfig {
        &self.config
    }

    async fn open_at(&mut self, position: EventLogCheckpoint) -> Result<(), ConnectorError> {
        self.reader = None;
        self.pending.clear();

        let mut file = match File::open(&self.config.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.state = HandleState::Closed;
                return Err(ConnectorError::ChannelNotFound(self.channel.clone()));
            }
            Err(e) => {
                self.state = HandleState::Closed;
                return Err(ConnectorError::from_io(e));
            }
        };

        let len = file
            .metadata()
            .await
            .map_err(ConnectorError::from_io)?
            .len();
        let position = if position.byte_offset > len {
            warn!(
                eventlog = %self.config.name,
                offset = position.byte_offset,
                len,
                "file is shorter than the checkpointed offset; reading from the start"
            );
            EventLogCheckpoint::new(self.config.name.clone())
        } else {
            position
        };

        file.seek(SeekFrom::Start(position.byte_offset))
            .await
            .map_err(ConnectorError::from_io)?;

        self.reader = Some(BufReader::new(file));
        self.position = position;
        self.state = HandleState::Open;
        Ok(())
    }

    /// Live-mode check run when a read finds no new data.
    async fn check_live_channel(&self) -> Result<(), ConnectorError> {
        match tokio::fs::metadata(&self.config.path).await {
            Ok(meta) => {
                let consumed = self.position.byte_offset + self.pending.len() as u64;
                if meta.len() < consumed {
                    Err(ConnectorError::Recoverable(format!(
                        "{} was truncated ({} < {consumed} bytes)",
                        self.channel,
                        meta.len()
                    )))
                } else {
                    Ok(())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConnectorError::ChannelNotFound(self.channel.clone()))
            }
            Err(e) => Err(ConnectorError::from_io(e)),
        }
    }
}

/// Turns the pending line into a record, advancing `position` past it.
///
/// Blank lines advance the byte offset but produce no record.
fn take_record(
    pending: &mut Vec<u8>,
    position: &mut EventLogCheckpoint,
    channel: &str,
) -> Option<Record> {
    let line = std::mem::take(pending);
    position.byte_offset += line.len() as u64;

    let text = String::from_utf8_lossy(&line);
    let text = text.trim_end_matches(&['\n', '\r'][..]);
    if text.trim().is_empty() {
        return None;
    }

    position.record_number += 1;
    position.timestamp_ms = Some(now_millis());
    Some(Record::new(channel, text, position.clone()))
}

#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[async_trait]
impl EventSource for FileEventLog {
    async fn open(&mut self, checkpoint: &EventLogCheckpoint) -> Result<(), ConnectorError> {
        let position = if checkpoint.name == self.config.name {
            checkpoint.clone()
        } else {
            if !checkpoint.name.is_empty() {
                warn!(
                    eventlog = %self.config.name,
                    checkpoint_name = %checkpoint.name,
                    "checkpoint belongs to another source; reading from the start"
                );
            }
            EventLogCheckpoint::new(self.config.name.clone())
        };

        info!(
            eventlog = %self.config.name,
            channel = %self.channel,
            mode = %self.config.mode,
            record_number = position.record_number,
            byte_offset = position.byte_offset,
            "opening file event log"
        );
        self.open_at(position).await
    }

    async fn read(&mut self) -> Result<Vec<Record>, ConnectorError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(ConnectorError::InvalidState {
                expected: "Open".into(),
                actual: self.state.to_string(),
            });
        };

        let limit = self.config.batch_size;
        let mut records = Vec::new();
        let mut at_eof = false;

        while records.len() < limit {
            let n = reader
                .read_until(b'\n', &mut self.pending)
                .await
                .map_err(ConnectorError::from_io)?;
            if n == 0 || self.pending.last() != Some(&b'\n') {
                at_eof = true;
                break;
            }
            if let Some(record) = take_record(&mut self.pending, &mut self.position, &self.channel)
            {
                records.push(record);
            }
        }

        if !at_eof {
            return Ok(records);
        }

        match self.config.mode {
            SourceMode::File => {
                // Archived files may end without a trailing newline.
                if !self.pending.is_empty() && records.len() < limit {
                    if let Some(record) =
                        take_record(&mut self.pending, &mut self.position, &self.channel)
                    {
                        records.push(record);
                    }
                }
                if records.is_empty() {
                    return Err(ConnectorError::EndOfStream);
                }
            }
            SourceMode::Live => {
                if records.is_empty() {
                    self.check_live_channel().await?;
                }
            }
        }

        debug!(eventlog = %self.config.name, records = records.len(), "read batch from file event log");
        Ok(records)
    }

    async fn reset(&mut self) -> Result<(), ConnectorError> {
        debug!(
            eventlog = %self.config.name,
            byte_offset = self.position.byte_offset,
            "resetting file event log handle"
        );
        let position = self.position.clone();
        self.open_at(position).await
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        if self.reader.take().is_some() {
            debug!(eventlog = %self.config.name, "closed file event log");
        }
        self.pending.clear();
        self.state = HandleState::Closed;
        Ok(())
    }

    fn is_file(&self) -> bool {
        self.config.mode == SourceMode::File
    }

    fn channel(&self) -> &str {
        &self.channel
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

impl std::fmt::Debug for FileEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEventLog")
            .field("name", &self.config.name)
            .field("channel", &self.channel)
            .field("mode", &self.config.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
