//! logtap agent: tails and reads log files, ships every line downstream as
//! JSON, and resumes from the last shipped line after a restart.

mod config;
mod output;

use std::sync::Arc;

use clap::Parser;
use logtap_connectors::{ChannelPublisher, CheckpointCommitter, FileEventLog, StoreCursor};
use logtap_runner::{EventLogRunner, Supervisor};
use logtap_storage::{CheckpointStore, FileSystemCheckpointStore};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{AgentConfig, Cli};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Records go to stdout, logs to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AgentConfig::load(&cli.config)?;

    if cli.test {
        self_test(&config).await
    } else {
        run(config).await
    }
}

/// Opens and closes every configured source without reading.
async fn self_test(config: &AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    for event_log in &config.event_logs {
        let mut source = FileEventLog::new(event_log.clone());
        EventLogRunner::test(&mut source).await?;
        info!(eventlog = %event_log.name, "self-test passed");
    }
    Ok(())
}

async fn run(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    // ── Checkpoint registry ──────────────────────────────────────
    let store: Arc<dyn CheckpointStore> =
        Arc::new(FileSystemCheckpointStore::open(&config.registry_path)?);

    // ── Output ───────────────────────────────────────────────────
    let (tx, rx) = mpsc::channel(config.output_buffer);
    let writer = tokio::spawn(output::write_records(
        rx,
        tokio::io::stdout(),
        CheckpointCommitter::new(Arc::clone(&store)),
    ));

    // ── Inputs ───────────────────────────────────────────────────
    let mut supervisor = Supervisor::new(config.runner.clone());
    for event_log in config.event_logs {
        let name = event_log.name.clone();
        supervisor.spawn(
            Box::new(FileEventLog::new(event_log)),
            Arc::new(StoreCursor::new(Arc::clone(&store), name.clone())),
            Arc::new(ChannelPublisher::new(name, tx.clone())),
        );
    }
    // The writer stops once every input's publisher is gone.
    drop(tx);

    let shutdown = supervisor.cancellation_token();
    let admin = config.admin_addr.map(|addr| {
        tokio::spawn(logtap_admin::serve(
            addr,
            supervisor.status_board(),
            shutdown.clone(),
        ))
    });

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                signal.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    // ── Wait for every input to stop ─────────────────────────────
    let outcomes = supervisor.wait().await;
    shutdown.cancel();

    // A failed writer drops its receiver, so the inputs have already
    // stopped with a publish error by now.
    let written = writer_outcome(writer.await);
    if let Some(admin) = admin {
        match admin.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "admin API stopped with an error"),
            Err(e) => warn!(error = %e, "admin API task did not complete"),
        }
    }

    let failed: Vec<_> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
        .collect();
    for (name, e) in &failed {
        error!(eventlog = %name, error = %e, "input failed");
    }
    info!(records = written.unwrap_or(0), inputs = outcomes.len(), failed = failed.len(), "agent stopped");

    if written.is_none() {
        Err("output writer failed".into())
    } else if failed.is_empty() {
        Ok(())
    } else {
        Err(format!("{} of {} inputs failed", failed.len(), outcomes.len()).into())
    }
}

/// Logs a failed output writer. Returns the number of records written, or
/// `None` if the writer failed.
fn writer_outcome(joined: Result<std::io::Result<u64>, tokio::task::JoinError>) -> Option<u64> {
    match joined {
        Ok(Ok(written)) => Some(written),
        Ok(Err(e)) => {
            error!(error = %e, "output writer failed");
            None
        }
        Err(e) => {
            error!(error = %e, "output writer task did not complete");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_outcome() {
        assert_eq!(writer_outcome(Ok(Ok(12))), Some(12));
        let broken = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert_eq!(writer_outcome(Ok(Err(broken))), None);
    }

    #[tokio::test]
    async fn test_writer_outcome_for_aborted_task() {
        let task = tokio::spawn(std::future::pending::<std::io::Result<u64>>());
        task.abort();
        assert_eq!(writer_outcome(task.await), None);
    }
}
