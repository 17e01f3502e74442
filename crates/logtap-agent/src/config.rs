//! Command line and agent configuration.
//!
//! The agent reads one JSON document. Sources are listed under
//! `event_logs`; a document without that key is treated as a single source
//! configuration.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use logtap_connectors::{ConnectorError, FileEventLogConfig};
use logtap_runner::RunnerConfig;
use serde::Deserialize;

#[derive(Parser, Debug, Clone)]
#[command(name = "logtap-agent")]
#[command(version)]
#[command(about = "Ships log files downstream with checkpointed, resumable readers", long_about = None)]
pub struct Cli {
    /// Path to the JSON agent configuration
    ///
    /// Can also be set via LOGTAP_CONFIG environment variable
    #[arg(short, long, env = "LOGTAP_CONFIG")]
    pub config: PathBuf,

    /// Open and close every configured source, then exit
    #[arg(long)]
    pub test: bool,
}

/// Errors loading the agent configuration.
#[derive(Debug, thiserror::Error)]
pub enum AgentConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to create new event log: {0}")]
    EventLog(#[from] ConnectorError),

    #[error("no event logs configured")]
    NoEventLogs,

    #[error("duplicate event log name {0:?}")]
    DuplicateName(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Settings shared by every input.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
    registry_path: PathBuf,
    admin_addr: Option<SocketAddr>,
    open_retry_interval_ms: u64,
    poll_interval_ms: u64,
    output_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let runner = RunnerConfig::default();
        Self {
            registry_path: PathBuf::from("data/registry.json"),
            admin_addr: None,
            open_retry_interval_ms: duration_ms(runner.open_retry_interval),
            poll_interval_ms: duration_ms(runner.poll_interval),
            output_buffer: 1024,
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // intervals are seconds, not centuries
fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Validated agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// One entry per input.
    pub event_logs: Vec<FileEventLogConfig>,
    /// Checkpoint registry file.
    pub registry_path: PathBuf,
    /// Address for the status API; disabled when absent.
    pub admin_addr: Option<SocketAddr>,
    /// Retry and poll intervals.
    pub runner: RunnerConfig,
    /// Capacity of the channel between the inputs and the output writer.
    pub output_buffer: usize,
}

impl AgentConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, AgentConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| AgentConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses and validates a configuration document.
    pub fn from_json(text: &str) -> Result<Self, AgentConfigError> {
        let doc: serde_json::Value = serde_json::from_str(text)?;

        let event_logs: Vec<FileEventLogConfig> = match doc.get("event_logs") {
            Some(list) => serde_json::from_value(list.clone())?,
            // Single source at the top level.
            None => vec![serde_json::from_value(doc.clone())?],
        };
        let settings: Settings = serde_json::from_value(doc)?;

        if event_logs.is_empty() {
            return Err(AgentConfigError::NoEventLogs);
        }
        let mut seen = HashSet::new();
        for event_log in &event_logs {
            event_log.validate()?;
            if !seen.insert(event_log.name.as_str()) {
                return Err(AgentConfigError::DuplicateName(event_log.name.clone()));
            }
        }
        if settings.output_buffer == 0 {
            return Err(AgentConfigError::InvalidSetting(
                "output_buffer must be greater than zero".into(),
            ));
        }
        if settings.open_retry_interval_ms == 0 || settings.poll_interval_ms == 0 {
            return Err(AgentConfigError::InvalidSetting(
                "retry and poll intervals must be greater than zero".into(),
            ));
        }

        Ok(Self {
            event_logs,
            registry_path: settings.registry_path,
            admin_addr: settings.admin_addr,
            runner: RunnerConfig {
                open_retry_interval: Duration::from_millis(settings.open_retry_interval_ms),
                poll_interval: Duration::from_millis(settings.poll_interval_ms),
            },
            output_buffer: settings.output_buffer,
        })
    }
}
