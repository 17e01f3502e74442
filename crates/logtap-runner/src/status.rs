//! Running/Degraded status reporting.
//!
//! The runner owns its status and writes it through a [`StatusSink`]. The
//! last written value holds until the next write.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Health of a runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerState {
    /// Reading normally.
    #[default]
    Running,
    /// Operating but hitting faults.
    Degraded,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// A state plus an optional human-readable explanation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunnerStatus {
    /// Current state.
    pub state: RunnerState,
    /// Explanation; empty when running normally.
    pub message: String,
}

/// Observable health channel written by the runner.
pub trait StatusSink: Send + Sync {
    /// Reports `state` with `message` (empty for none).
    fn update_status(&self, state: RunnerState, message: &str);
}

/// [`StatusSink`] backed by a `watch` channel.
///
/// Writes identical to the current value do not wake subscribers.
#[derive(Debug)]
pub struct WatchStatusSink {
    tx: watch::Sender<RunnerStatus>,
}

impl WatchStatusSink {
    /// Creates a sink and a receiver for its updates.
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<RunnerStatus>) {
        let (tx, rx) = watch::channel(RunnerStatus::default());
        (Self { tx }, rx)
    }

    /// Returns a fresh receiver.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunnerStatus> {
        self.tx.subscribe()
    }

    /// Returns the last written status.
    #[must_use]
    pub fn current(&self) -> RunnerStatus {
        self.tx.borrow().clone()
    }
}

impl StatusSink for WatchStatusSink {
    fn update_status(&self, state: RunnerState, message: &str) {
        self.tx.send_if_modified(|current| {
            if current.state == state && current.message == message {
                return false;
            }
            current.state = state;
            message.clone_into(&mut current.message);
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_updates_reach_subscribers() {
        let (sink, mut rx) = WatchStatusSink::new();
        sink.update_status(RunnerState::Degraded, "channel not found");

        rx.changed().await.unwrap();
        let status = rx.borrow_and_update().clone();
        assert_eq!(status.state, RunnerState::Degraded);
        assert_eq!(status.message, "channel not found");
    }

    #[test]
    fn test_identical_write_is_suppressed() {
        let (sink, mut rx) = WatchStatusSink::new();
        rx.mark_unchanged();

        sink.update_status(RunnerState::Running, "");
        assert!(!rx.has_changed().unwrap());

        sink.update_status(RunnerState::Degraded, "reset failed");
        assert!(rx.has_changed().unwrap());
        rx.mark_unchanged();

        sink.update_status(RunnerState::Degraded, "reset failed");
        assert!(!rx.has_changed().unwrap());
        assert_eq!(sink.current().message, "reset failed");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RunnerState::Running.to_string(), "running");
        assert_eq!(RunnerState::Degraded.to_string(), "degraded");
    }
}
