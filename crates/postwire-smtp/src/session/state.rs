//! Session state machine.

/// Step of an AUTH LOGIN exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    /// `AUTH LOGIN` sent.
    AuthSent,
    /// Encoded username sent.
    UsernameSent,
    /// Encoded password sent.
    PasswordSent,
}

/// Step of a mail transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStep {
    /// `MAIL FROM` sent.
    Mail,
    /// `RCPT TO` sent for the recipient at this index.
    Recipient(usize),
    /// `DATA` sent.
    Data,
    /// Content and terminator sent.
    Content,
    /// BDAT chunk at this index sent.
    Chunk(usize),
}

/// State of a [`Session`](super::Session).
///
/// ```text
/// NotConnected ── connect ──→ Idle ⇄ { StartTls, Authenticating, Sending }
///                              │
///                              └── quit / force_close ──→ Terminated
///
/// Transport failure from any state ──→ Broken
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection attempted yet.
    #[default]
    NotConnected,
    /// Ready for the next operation.
    Idle,
    /// STARTTLS and the following EHLO in progress.
    StartTls,
    /// AUTH LOGIN in progress.
    Authenticating(AuthStep),
    /// Mail transaction in progress.
    Sending(SendStep),
    /// Closed by QUIT or [`force_close`](super::Session::force_close).
    Terminated,
    /// The connection was lost.
    Broken,
}

impl SessionState {
    /// Returns true while a multi-step operation is running.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(
            self,
            Self::StartTls | Self::Authenticating(_) | Self::Sending(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_states() {
        assert!(SessionState::StartTls.is_busy());
        assert!(SessionState::Authenticating(AuthStep::UsernameSent).is_busy());
        assert!(SessionState::Sending(SendStep::Recipient(2)).is_busy());
        assert!(!SessionState::Idle.is_busy());
        assert!(!SessionState::Terminated.is_busy());
    }
}
