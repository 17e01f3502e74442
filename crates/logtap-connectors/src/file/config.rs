//! File source configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

/// Default maximum number of records returned by one `read()`.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// How a file source treats the end of its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Tail the file and wait for more data.
    #[default]
    Live,
    /// Read an archived file once, to the end.
    File,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::File => f.write_str("file"),
        }
    }
}

impl FromStr for SourceMode {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" | "tail" => Ok(Self::Live),
            "file" | "archive" | "archived" => Ok(Self::File),
            other => Err(ConnectorError::ConfigurationError(format!(
                "invalid source mode: '{other}'"
            ))),
        }
    }
}

/// Configuration for one [`FileEventLog`](super::FileEventLog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEventLogConfig {
    /// Source name; also the checkpoint key.
    pub name: String,
    /// Log file path.
    pub path: PathBuf,
    /// Live tail or archived read.
    #[serde(default)]
    pub mode: SourceMode,
    /// Maximum records per `read()`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl FileEventLogConfig {
    /// Configuration for a tailed live log.
    #[must_use]
    pub fn live(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            mode: SourceMode::Live,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Configuration for an archived log read once.
    #[must_use]
    pub fn archived(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            mode: SourceMode::File,
            ..Self::live(name, path)
        }
    }

    /// Sets the maximum records per `read()`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if the name or path is
    /// empty or the batch size is zero.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.name.trim().is_empty() {
            return Err(ConnectorError::ConfigurationError(
                "event log name must not be empty".into(),
            ));
        }
        if self.path.as_os_str().is_empty() {
            return Err(ConnectorError::ConfigurationError(format!(
                "event log '{}' has no path",
                self.name
            )));
        }
        if self.batch_size == 0 {
            return Err(ConnectorError::ConfigurationError(format!(
                "event log '{}' batch_size must be greater than zero",
                self.name
            )));
        }
        Ok(())
    }
}
