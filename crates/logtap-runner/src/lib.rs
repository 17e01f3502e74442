//! # logtap Runner
//!
//! The resumable read loop at the heart of the agent. One
//! [`EventLogRunner`] drives exactly one event source: it opens the source
//! at the last acknowledged checkpoint, classifies every failure as
//! retryable or terminal, publishes records in order, reports
//! Running/Degraded status, and closes the source exactly once on every
//! exit path.
//!
//! [`spawn_runner`] and [`Supervisor`] run one such loop per configured
//! input on the tokio runtime.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

/// Runner timing configuration.
pub mod config;

/// Runner error type.
pub mod error;

/// Lock-free runner counters.
pub mod metrics;

/// Failure classification.
pub mod policy;

/// The runner state machine.
pub mod runner;

/// Running/Degraded status reporting.
pub mod status;

/// Multi-input supervision.
pub mod supervisor;

/// Per-input tokio task.
pub mod task;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use metrics::{RunnerMetrics, RunnerMetricsSnapshot};
pub use policy::{classify, ErrorClass};
pub use runner::EventLogRunner;
pub use status::{RunnerState, RunnerStatus, StatusSink, WatchStatusSink};
pub use supervisor::{InputOutcome, StatusBoard, Supervisor};
pub use task::{spawn_runner, InputView, RunnerHandle};
