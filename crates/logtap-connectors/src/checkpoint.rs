//! Source read positions.
//!
//! An [`EventLogCheckpoint`] marks the position just after a record. It is
//! attached to every record a source returns and is what gets persisted once
//! that record has been accepted downstream. The zero value (`Default`) means
//! "start of source".

use serde::{Deserialize, Serialize};

/// Position of a record within one event source.
///
/// Stored as a JSON document under the input's key in the checkpoint
/// registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogCheckpoint {
    /// Name of the source this position belongs to.
    ///
    /// A checkpoint whose name does not match the source it is handed to is
    /// ignored by that source.
    #[serde(default)]
    pub name: String,
    /// 1-based number of the last record read. `0` before any record.
    #[serde(default)]
    pub record_number: u64,
    /// Byte offset just past the last record read.
    #[serde(default)]
    pub byte_offset: u64,
    /// Wall-clock time the record was read (epoch millis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

impl EventLogCheckpoint {
    /// Creates a start-of-source position for the named source.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if this position precedes every record.
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.record_number == 0 && self.byte_offset == 0
    }

    /// Serializes this checkpoint into the registry's JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parses a checkpoint from the registry's JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a checkpoint document.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
