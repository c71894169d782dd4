//! Error types for SMTP operations.
//!
//! Only local contract violations and transport failures are errors. Server
//! replies, including negative and malformed ones, are returned as
//! [`Response`](crate::Response) values.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command or operation cannot be performed in the current state.
    #[error("Invalid state for {operation}: {state}")]
    InvalidState {
        /// Rejected operation.
        operation: &'static str,
        /// State at the time of the call.
        state: String,
    },

    /// Server sent data while no command was outstanding.
    #[error("Received {0} unsolicited bytes from server")]
    NotExpectingData(usize),

    /// Function called with an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS handshake or protocol error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server name is not valid for TLS.
    #[error("Invalid server name for TLS: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// No reply or write progress within the configured deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Server closed the connection while a reply was outstanding.
    #[error("Connection broken")]
    ConnectionBroken,

    /// Message model error.
    #[error("Message error: {0}")]
    Mime(#[from] postwire_mime::Error),
}

impl Error {
    pub(crate) fn invalid_state(operation: &'static str, state: impl std::fmt::Debug) -> Self {
        Self::InvalidState {
            operation,
            state: format!("{state:?}"),
        }
    }

    /// Returns true for local contract violations (misuse of the API).
    #[must_use]
    pub const fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::NotExpectingData(_) | Self::InvalidArgument(_)
        )
    }

    /// Returns true if the connection can no longer be used.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::ConnectionBroken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_programming_errors() {
        assert!(Error::invalid_state("ehlo", "Idle").is_programming_error());
        assert!(Error::NotExpectingData(3).is_programming_error());
        assert!(Error::InvalidArgument("x".into()).is_programming_error());
        assert!(!Error::ConnectionBroken.is_programming_error());
    }

    #[test]
    fn test_connection_lost() {
        assert!(Error::ConnectionBroken.is_connection_lost());
        assert!(Error::Timeout(Duration::from_secs(1)).is_connection_lost());
        assert!(!Error::InvalidArgument("x".into()).is_connection_lost());
    }

    #[test]
    fn test_invalid_state_message() {
        let err = Error::invalid_state("rcpt", "NotConnected");
        assert_eq!(err.to_string(), "Invalid state for rcpt: \"NotConnected\"");
    }
}
