//! SMTP reply types.

use std::fmt;

/// SMTP reply from server.
///
/// Lines are kept exactly as received (minus CRLF), each still carrying its
/// three-digit code and separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Raw reply lines.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true if this is a positive completion reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is a positive intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code.is_intermediate()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Text of each line with the code and separator removed.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.get(4..).unwrap_or(""))
    }

    /// Returns the message text as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.text_lines().collect::<Vec<_>>().join("\n")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}

/// Why a reply could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MalformedReason {
    /// An empty chunk was fed.
    NoData,
    /// A line does not start with a `[2-5][0-5][0-9][- ]` prefix.
    InvalidCode,
    /// A line carries a different code than the first line.
    CodeMismatch,
    /// Data followed the line marked as last.
    PrematureLastLine,
    /// A line exceeds the parser's length limit.
    LineTooLong,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoData => "no data",
            Self::InvalidCode => "invalid code",
            Self::CodeMismatch => "code mismatch",
            Self::PrematureLastLine => "premature last line",
            Self::LineTooLong => "line too long",
        };
        f.write_str(text)
    }
}

/// Outcome of reading one reply: either a parsed reply or the reason it was
/// malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A complete, well-formed reply.
    Reply(Reply),
    /// The server's bytes did not form a valid reply.
    Malformed(MalformedReason),
}

impl Response {
    /// The reply, if well-formed.
    #[must_use]
    pub const fn reply(&self) -> Option<&Reply> {
        match self {
            Self::Reply(reply) => Some(reply),
            Self::Malformed(_) => None,
        }
    }

    /// The reply code, if well-formed.
    #[must_use]
    pub const fn code(&self) -> Option<ReplyCode> {
        match self {
            Self::Reply(reply) => Some(reply.code),
            Self::Malformed(_) => None,
        }
    }

    /// Raw reply lines. Empty for malformed replies.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        match self {
            Self::Reply(reply) => &reply.lines,
            Self::Malformed(_) => &[],
        }
    }

    /// Returns true for a well-formed 2xx reply.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Reply(reply) if reply.is_success())
    }

    /// Returns true for a well-formed 3xx reply.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        matches!(self, Self::Reply(reply) if reply.is_intermediate())
    }

    /// Returns true if the reply could not be parsed.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(reply) => reply.fmt(f),
            Self::Malformed(reason) => write!(f, "malformed reply: {reason}"),
        }
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Common reply codes
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}
