//! Errors produced by sources, publishers and cursors.
//!
//! The first four variants are the conditions the runner retries or stops
//! on by name; everything else is treated as unexpected.

use logtap_storage::CheckpointStoreError;

/// Errors from connector operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The source handle is unusable but the subscription can be restored
    /// by resetting or reopening it.
    #[error("recoverable source error: {0}")]
    Recoverable(String),

    /// The named event channel does not exist (yet).
    #[error("event channel not found: {0}")]
    ChannelNotFound(String),

    /// An archived source has been read to the end.
    #[error("end of event stream")]
    EndOfStream,

    /// The downstream consumer went away or refused delivery.
    #[error("publisher disconnected: {0}")]
    Disconnected(String),

    /// Operation called in the wrong lifecycle state.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: String,
        /// State the connector was in.
        actual: String,
    },

    /// Non-transient read failure.
    #[error("read error: {0}")]
    ReadError(String),

    /// Invalid connector configuration.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Checkpoint could not be loaded or stored.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointStoreError),

    /// Checkpoint document did not match the expected shape.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    /// Maps an I/O error to a connector error, treating interruptions and
    /// timeouts as recoverable.
    #[must_use]
    pub fn from_io(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                Self::Recoverable(err.to_string())
            }
            _ => Self::Io(err),
        }
    }
}
