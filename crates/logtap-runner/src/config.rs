//! Runner configuration.

use std::time::Duration;

/// Wait between attempts to open a source that is temporarily unavailable.
pub const DEFAULT_OPEN_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Wait before reading again after a read returned no records.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed retry and poll intervals for an [`EventLogRunner`](crate::EventLogRunner).
///
/// Both intervals are constant: there is no exponential growth and no retry
/// ceiling. Retries continue until the runner is cancelled.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Wait after a recoverable or channel-not-found `open()` failure.
    pub open_retry_interval: Duration,

    /// Wait after a `read()` that returned an empty batch.
    pub poll_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            open_retry_interval: DEFAULT_OPEN_RETRY_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
