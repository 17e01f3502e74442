//! File-backed event sources.
//!
//! [`FileEventLog`] reads newline-delimited events from a log file in one of
//! two modes:
//!
//! - **file**: an archived log, read from the checkpoint to the end and then
//!   reported as [`EndOfStream`](crate::error::ConnectorError::EndOfStream).
//! - **live**: a tailed log whose path is the channel. A missing file is a
//!   "channel not found" condition and a shrinking file is recoverable.

pub mod config;
pub mod source;

pub use config::{FileEventLogConfig, SourceMode};
pub use source::{FileEventLog, HandleState};
