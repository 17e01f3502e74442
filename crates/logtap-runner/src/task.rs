//! Per-input tokio task with exclusive ownership of its source.
//!
//! Each input runs its own [`EventLogRunner`] on its own task. The task owns
//! the source outright; status, metrics and cancellation are shared with the
//! caller through the returned [`RunnerHandle`].

use std::sync::Arc;

use logtap_connectors::{Cursor, EventSource, Publisher};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::metrics::{RunnerMetrics, RunnerMetricsSnapshot};
use crate::runner::EventLogRunner;
use crate::status::{RunnerStatus, WatchStatusSink};

/// Handle returned when a runner task is spawned.
pub struct RunnerHandle {
    /// Input (source) name.
    pub name: String,
    /// Channel the source reads.
    pub channel: String,
    /// Task join handle; resolves to the runner's result.
    pub join: tokio::task::JoinHandle<Result<(), RunnerError>>,
    /// Cancels this runner only.
    pub cancel: CancellationToken,
    /// Latest status written by the runner.
    pub status_rx: watch::Receiver<RunnerStatus>,
    /// Per-runner metrics (lock-free atomic reads).
    pub metrics: Arc<RunnerMetrics>,
}

impl RunnerHandle {
    /// Point-in-time view of this input.
    #[must_use]
    pub fn view(&self) -> InputView {
        InputView::capture(&self.name, &self.channel, &self.status_rx, &self.metrics)
    }
}

impl std::fmt::Debug for RunnerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerHandle")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("finished", &self.join.is_finished())
            .finish_non_exhaustive()
    }
}

/// Status and metrics of one input, as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputView {
    /// Input name.
    pub name: String,
    /// Channel read by the input.
    pub channel: String,
    /// Last reported status.
    pub status: RunnerStatus,
    /// Counters at the time of the view.
    pub metrics: RunnerMetricsSnapshot,
}

impl InputView {
    pub(crate) fn capture(
        name: &str,
        channel: &str,
        status_rx: &watch::Receiver<RunnerStatus>,
        metrics: &RunnerMetrics,
    ) -> Self {
        Self {
            name: name.to_string(),
            channel: channel.to_string(),
            status: status_rx.borrow().clone(),
            metrics: metrics.snapshot(),
        }
    }
}

/// Spawns a task running `source` until it finishes or `parent` is
/// cancelled.
///
/// The runner observes a child of `parent`, so cancelling the returned
/// handle's token stops this input alone.
#[must_use]
pub fn spawn_runner(
    mut source: Box<dyn EventSource>,
    cursor: Arc<dyn Cursor>,
    publisher: Arc<dyn Publisher>,
    config: &RunnerConfig,
    parent: &CancellationToken,
) -> RunnerHandle {
    let name = source.name().to_string();
    let channel = source.channel().to_string();
    let cancel = parent.child_token();
    let (status, status_rx) = WatchStatusSink::new();
    let metrics = Arc::new(RunnerMetrics::default());
    let runner = EventLogRunner::new(config.clone()).with_metrics(Arc::clone(&metrics));

    let task_name = name.clone();
    let task_cancel = cancel.clone();
    let join = tokio::spawn(async move {
        tracing::debug!(eventlog = %task_name, "runner task started");
        let result = runner
            .run(
                source.as_mut(),
                cursor.as_ref(),
                publisher.as_ref(),
                &status,
                &task_cancel,
            )
            .await;
        match &result {
            Ok(()) => tracing::info!(eventlog = %task_name, "runner stopped"),
            Err(e) => tracing::error!(eventlog = %task_name, error = %e, "runner failed"),
        }
        result
    });

    RunnerHandle {
        name,
        channel,
        join,
        cancel,
        status_rx,
        metrics,
    }
}
