//! Connection state machine.

/// The command whose reply is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Server greeting after connect.
    Greeting,
    /// HELO
    Helo,
    /// EHLO
    Ehlo,
    /// NOOP
    Noop,
    /// RSET
    Rset,
    /// QUIT
    Quit,
    /// MAIL FROM
    Mail,
    /// RCPT TO
    Rcpt,
    /// DATA
    Data,
    /// Content terminator after DATA.
    Content,
    /// BDAT chunk
    Bdat,
    /// VRFY
    Vrfy,
    /// EXPN
    Expn,
    /// HELP
    Help,
    /// STARTTLS
    StartTls,
    /// AUTH and its continuation lines
    Auth,
    /// Free-form command line
    Raw,
}

impl CommandKind {
    /// Verb used in logs and error messages.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Helo => "HELO",
            Self::Ehlo => "EHLO",
            Self::Noop => "NOOP",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
            Self::Mail => "MAIL",
            Self::Rcpt => "RCPT",
            Self::Data => "DATA",
            Self::Content => "content",
            Self::Bdat => "BDAT",
            Self::Vrfy => "VRFY",
            Self::Expn => "EXPN",
            Self::Help => "HELP",
            Self::StartTls => "STARTTLS",
            Self::Auth => "AUTH",
            Self::Raw => "raw command",
        }
    }
}

/// State of an [`SmtpClient`](super::SmtpClient).
///
/// ```text
/// NotConnected ── connect ──→ Connecting ──→ AwaitingReply(Greeting)
///                                                   │
///        ┌──────── reply ─────────┬─────────────────┘
///        ↓                        │
///      Idle ── command ──→ AwaitingReply(kind)
///        │                        │
///        │                        └── QUIT reply ──→ Terminated
///        └── upgrade_to_tls ──→ Handshaking ──→ Idle
///
/// Any transport failure or remote close ──→ Broken
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport yet.
    #[default]
    NotConnected,
    /// Transport being opened.
    Connecting,
    /// Ready for the next command.
    Idle,
    /// A command was written and its reply has not completed.
    AwaitingReply(CommandKind),
    /// TLS handshake in progress on the open transport.
    Handshaking,
    /// QUIT was answered; the transport is released.
    Terminated,
    /// The transport failed or was closed by the server.
    Broken,
}

impl ConnectionState {
    /// Returns true if a reply is outstanding.
    #[must_use]
    pub const fn is_awaiting_reply(self) -> bool {
        matches!(self, Self::AwaitingReply(_))
    }

    /// Returns true once the connection can no longer be used.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Terminated | Self::Broken)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_not_connected() {
        assert_eq!(ConnectionState::default(), ConnectionState::NotConnected);
    }

    #[test]
    fn test_awaiting_reply() {
        assert!(ConnectionState::AwaitingReply(CommandKind::Ehlo).is_awaiting_reply());
        assert!(!ConnectionState::Idle.is_awaiting_reply());
    }

    #[test]
    fn test_closed() {
        assert!(ConnectionState::Terminated.is_closed());
        assert!(ConnectionState::Broken.is_closed());
        assert!(!ConnectionState::Handshaking.is_closed());
    }
}
