//! One runner per configured input.
//!
//! The supervisor does no fan-in: every input keeps its own runner, source
//! and checkpoint key. It only owns the shared shutdown token and the
//! [`StatusBoard`] operators read from.

use std::sync::Arc;

use logtap_connectors::{Cursor, EventSource, Publisher};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::metrics::RunnerMetrics;
use crate::status::RunnerStatus;
use crate::task::{spawn_runner, InputView, RunnerHandle};

/// How one input's runner ended.
#[derive(Debug)]
pub struct InputOutcome {
    /// Input name.
    pub name: String,
    /// The runner's result.
    pub result: Result<(), RunnerError>,
}

struct BoardEntry {
    name: String,
    channel: String,
    status_rx: watch::Receiver<RunnerStatus>,
    metrics: Arc<RunnerMetrics>,
}

impl BoardEntry {
    fn view(&self) -> InputView {
        InputView::capture(&self.name, &self.channel, &self.status_rx, &self.metrics)
    }
}

/// Cloneable read-only view of every supervised input.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inputs: Arc<RwLock<Vec<BoardEntry>>>,
}

impl StatusBoard {
    /// Views of all inputs, in spawn order.
    #[must_use]
    pub fn views(&self) -> Vec<InputView> {
        self.inputs.read().iter().map(BoardEntry::view).collect()
    }

    /// View of the input called `name`.
    #[must_use]
    pub fn view(&self, name: &str) -> Option<InputView> {
        self.inputs
            .read()
            .iter()
            .find(|entry| entry.name == name)
            .map(BoardEntry::view)
    }

    fn register(&self, handle: &RunnerHandle) {
        self.inputs.write().push(BoardEntry {
            name: handle.name.clone(),
            channel: handle.channel.clone(),
            status_rx: handle.status_rx.clone(),
            metrics: Arc::clone(&handle.metrics),
        });
    }
}

impl std::fmt::Debug for StatusBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBoard")
            .field("inputs", &self.inputs.read().len())
            .finish()
    }
}

/// Spawns and stops the runners of a set of inputs.
#[derive(Debug)]
pub struct Supervisor {
    config: RunnerConfig,
    cancel: CancellationToken,
    board: StatusBoard,
    runners: Vec<RunnerHandle>,
}

impl Supervisor {
    /// Creates a supervisor with no inputs.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            board: StatusBoard::default(),
            runners: Vec::new(),
        }
    }

    /// Token whose cancellation stops every runner.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Shared view of every input, for status reporting.
    #[must_use]
    pub fn status_board(&self) -> StatusBoard {
        self.board.clone()
    }

    /// Number of supervised inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    /// Whether no inputs are supervised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Starts a runner for `source`.
    pub fn spawn(
        &mut self,
        source: Box<dyn EventSource>,
        cursor: Arc<dyn Cursor>,
        publisher: Arc<dyn Publisher>,
    ) {
        let handle = spawn_runner(source, cursor, publisher, &self.config, &self.cancel);
        info!(eventlog = %handle.name, channel = %handle.channel, "input started");
        self.board.register(&handle);
        self.runners.push(handle);
    }

    /// Cancels every runner and waits for each to close its source.
    pub async fn shutdown(self) -> Vec<InputOutcome> {
        self.cancel.cancel();
        self.join_all().await
    }

    /// Waits for every runner to stop on its own (all inputs archived, or
    /// all failed) without cancelling them.
    pub async fn wait(self) -> Vec<InputOutcome> {
        self.join_all().await
    }

    async fn join_all(self) -> Vec<InputOutcome> {
        let mut outcomes = Vec::with_capacity(self.runners.len());
        for handle in self.runners {
            let result = match handle.join.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(eventlog = %handle.name, error = %e, "runner task did not complete");
                    Err(RunnerError::Task {
                        input: handle.name.clone(),
                        message: e.to_string(),
                    })
                }
            };
            outcomes.push(InputOutcome {
                name: handle.name,
                result,
            });
        }
        outcomes
    }
}
