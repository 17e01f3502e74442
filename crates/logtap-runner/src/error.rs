//! Runner error type.

use logtap_connectors::ConnectorError;

use crate::policy::ErrorClass;

/// Terminal outcomes of a runner, returned to its caller.
///
/// Retryable conditions are absorbed by the runner and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// `open()` failed with a non-retryable error.
    #[error("failed to open event log channel {channel:?}: {source}")]
    Open {
        /// Channel that failed to open.
        channel: String,
        /// Underlying error.
        #[source]
        source: ConnectorError,
    },

    /// `read()` failed with a non-retryable error.
    #[error("error reading from event log channel {channel:?}: {source}")]
    Read {
        /// Channel being read.
        channel: String,
        /// Underlying error.
        #[source]
        source: ConnectorError,
    },

    /// The publisher refused a record.
    #[error("publisher disconnected: {0}")]
    PublishDisconnect(#[source] ConnectorError),

    /// The self-test could not open the source.
    #[error("failed to open {channel:?}: {source}")]
    SelfTest {
        /// Channel under test.
        channel: String,
        /// Underlying error.
        #[source]
        source: ConnectorError,
    },

    /// The self-test could not close the source.
    #[error("failed to close {channel:?}: {source}")]
    Close {
        /// Channel under test.
        channel: String,
        /// Underlying error.
        #[source]
        source: ConnectorError,
    },

    /// The runner task panicked or was aborted.
    #[error("runner task for {input:?} failed: {message}")]
    Task {
        /// Input name.
        input: String,
        /// Join error description.
        message: String,
    },
}

impl RunnerError {
    /// Classification of this terminal error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::PublishDisconnect(_) => ErrorClass::PublishDisconnect,
            _ => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class() {
        let err = RunnerError::PublishDisconnect(ConnectorError::Disconnected("gone".into()));
        assert_eq!(err.class(), ErrorClass::PublishDisconnect);

        let err = RunnerError::Read {
            channel: "app.log".into(),
            source: ConnectorError::ReadError("bad".into()),
        };
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[test]
    fn test_display_names_channel() {
        let err = RunnerError::Open {
            channel: "Security".into(),
            source: ConnectorError::ConfigurationError("no access".into()),
        };
        assert_eq!(
            err.to_string(),
            "failed to open event log channel \"Security\": configuration error: no access"
        );
    }
}
