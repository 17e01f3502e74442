//! # logtap Connectors
//!
//! Adapters between the ingestion runner and the outside world: event
//! sources it reads from, the publisher it delivers to, and the cursor it
//! resumes from.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

/// Source read positions.
pub mod checkpoint;

/// Source, publisher and cursor traits plus the record type they exchange.
pub mod connector;

/// Store-backed checkpoint cursor.
pub mod cursor;

/// Connector error type.
pub mod error;

/// File-backed event sources (archived files and live tails).
pub mod file;

/// Channel-backed publisher.
pub mod publisher;

/// Test fakes for sources, publishers and cursors.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use checkpoint::EventLogCheckpoint;
pub use connector::{Cursor, EventSource, Publisher, Record};
pub use cursor::StoreCursor;
pub use error::ConnectorError;
pub use file::{FileEventLog, FileEventLogConfig, SourceMode};
pub use publisher::{ChannelPublisher, CheckpointCommitter, PendingAcks, PublishedRecord};
