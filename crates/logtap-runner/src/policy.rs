//! Failure classification.
//!
//! Every error a source or publisher returns is sorted into one
//! [`ErrorClass`]. The class alone decides whether the runner retries,
//! stops cleanly, or stops with an error.

use logtap_connectors::ConnectorError;

/// How the runner reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; reset or reopen the source and keep going.
    Recoverable,
    /// A live channel is missing; degrade and keep retrying.
    ChannelNotFound,
    /// An archived source is exhausted; stop without error.
    EndOfStream,
    /// Downstream went away; stop and report.
    PublishDisconnect,
    /// Anything else; stop and report.
    Fatal,
}

impl ErrorClass {
    /// Whether the runner retries failures of this class.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Recoverable | Self::ChannelNotFound)
    }
}

/// Classifies `err` for a source whose `is_file()` is `is_file`.
///
/// A missing channel only counts as [`ErrorClass::ChannelNotFound`] for live
/// sources; for archived files it is [`ErrorClass::Fatal`].
#[must_use]
pub fn classify(err: &ConnectorError, is_file: bool) -> ErrorClass {
    match err {
        ConnectorError::Recoverable(_) => ErrorClass::Recoverable,
        ConnectorError::ChannelNotFound(_) if !is_file => ErrorClass::ChannelNotFound,
        ConnectorError::EndOfStream => ErrorClass::EndOfStream,
        ConnectorError::Disconnected(_) => ErrorClass::PublishDisconnect,
        _ => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_regardless_of_kind() {
        let err = ConnectorError::Recoverable("handle invalidated".into());
        assert_eq!(classify(&err, false), ErrorClass::Recoverable);
        assert_eq!(classify(&err, true), ErrorClass::Recoverable);
    }

    #[test]
    fn test_channel_not_found_only_for_live_sources() {
        let err = ConnectorError::ChannelNotFound("Application".into());
        assert_eq!(classify(&err, false), ErrorClass::ChannelNotFound);
        assert_eq!(classify(&err, true), ErrorClass::Fatal);
    }

    #[test]
    fn test_terminal_classes() {
        assert_eq!(classify(&ConnectorError::EndOfStream, true), ErrorClass::EndOfStream);
        assert_eq!(
            classify(&ConnectorError::Disconnected("gone".into()), false),
            ErrorClass::PublishDisconnect
        );
        assert_eq!(
            classify(&ConnectorError::ReadError("bad record".into()), false),
            ErrorClass::Fatal
        );
        assert_eq!(
            classify(&ConnectorError::from_io(std::io::Error::other("boom")), false),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorClass::Recoverable.is_retryable());
        assert!(ErrorClass::ChannelNotFound.is_retryable());
        assert!(!ErrorClass::EndOfStream.is_retryable());
        assert!(!ErrorClass::PublishDisconnect.is_retryable());
        assert!(!ErrorClass::Fatal.is_retryable());
    }
}
