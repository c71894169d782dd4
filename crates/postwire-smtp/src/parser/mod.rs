//! Incremental SMTP reply parser.
//!
//! Replies use the three-digit grammar shared with FTP:
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
//!
//! [`ThreeDigitReply`] accepts the bytes of one reply in arbitrary chunks.
//! Chunk boundaries may fall anywhere, including inside the code, the
//! separator, or the CRLF.

use crate::types::{MalformedReason, Reply, ReplyCode, Response};

/// Maximum reply line length, excluding CRLF.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Result of feeding a chunk to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// More bytes are needed.
    InProgress,
    /// The reply is complete and holds this many lines (always > 0).
    Complete(usize),
    /// The reply is malformed.
    Malformed(MalformedReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Status {
    #[default]
    InProgress,
    Complete,
    Malformed(MalformedReason),
}

/// Single-use parser for one reply.
///
/// Once complete or malformed the parser ignores further input and keeps
/// reporting the same result.
#[derive(Debug, Default)]
pub struct ThreeDigitReply {
    status: Status,
    code: Option<ReplyCode>,
    lines: Vec<Vec<u8>>,
    pending: Vec<u8>,
}

impl ThreeDigitReply {
    /// Creates a parser awaiting the first line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next chunk of bytes.
    pub fn feed(&mut self, chunk: &[u8]) -> Feed {
        if self.status != Status::InProgress {
            return self.result();
        }
        if chunk.is_empty() {
            return self.fail(MalformedReason::NoData);
        }

        // A CR left at the end of the previous chunk may pair with an LF here.
        let mut search = self.pending.len().saturating_sub(1);
        self.pending.extend_from_slice(chunk);
        let mut start = 0;

        while let Some(offset) = find_crlf(&self.pending[search..]) {
            let end = search + offset;
            let line = self.pending[start..end].to_vec();
            start = end + 2;
            search = start;

            let is_last = match self.accept_line(&line) {
                Ok(is_last) => is_last,
                Err(reason) => return self.fail(reason),
            };
            self.lines.push(line);

            if is_last {
                if start < self.pending.len() {
                    return self.fail(MalformedReason::PrematureLastLine);
                }
                self.pending.clear();
                self.status = Status::Complete;
                return self.result();
            }
        }

        self.pending.drain(..start);
        if let Err(reason) = check_partial_prefix(&self.pending) {
            return self.fail(reason);
        }
        if self.pending.len() > MAX_LINE_LENGTH + 1 {
            return self.fail(MalformedReason::LineTooLong);
        }
        Feed::InProgress
    }

    /// Current result without feeding anything.
    #[must_use]
    pub fn result(&self) -> Feed {
        match self.status {
            Status::InProgress => Feed::InProgress,
            Status::Complete => Feed::Complete(self.lines.len()),
            Status::Malformed(reason) => Feed::Malformed(reason),
        }
    }

    /// Reply code, once complete.
    #[must_use]
    pub fn code(&self) -> Option<ReplyCode> {
        match self.status {
            Status::Complete => self.code,
            _ => None,
        }
    }

    /// Completed lines so far, including their code prefix.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Consumes the parser, returning the response if it reached a terminal
    /// status.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self.status {
            Status::InProgress => None,
            Status::Malformed(reason) => Some(Response::Malformed(reason)),
            Status::Complete => {
                let code = self.code?;
                let lines = self.lines.into_iter().map(decode_line).collect();
                Some(Response::Reply(Reply::new(code, lines)))
            }
        }
    }

    fn fail(&mut self, reason: MalformedReason) -> Feed {
        self.status = Status::Malformed(reason);
        self.pending.clear();
        Feed::Malformed(reason)
    }

    /// Validates a complete line. Returns whether it is the last line.
    fn accept_line(&mut self, line: &[u8]) -> Result<bool, MalformedReason> {
        if line.len() > MAX_LINE_LENGTH {
            return Err(MalformedReason::LineTooLong);
        }
        if line.len() < 4 {
            return Err(MalformedReason::InvalidCode);
        }
        check_partial_prefix(line)?;

        let code = ReplyCode::new(
            line[..3]
                .iter()
                .fold(0u16, |acc, &digit| acc * 10 + u16::from(digit - b'0')),
        );
        match self.code {
            None => self.code = Some(code),
            Some(expected) if expected != code => return Err(MalformedReason::CodeMismatch),
            Some(_) => {}
        }

        Ok(line[3] == b' ')
    }
}

/// Checks the `[2-5][0-5][0-9][- ]` prefix on as many bytes as are present.
fn check_partial_prefix(bytes: &[u8]) -> Result<(), MalformedReason> {
    let valid = bytes.iter().take(4).enumerate().all(|(i, &b)| match i {
        0 => (b'2'..=b'5').contains(&b),
        1 => (b'0'..=b'5').contains(&b),
        2 => b.is_ascii_digit(),
        _ => b == b'-' || b == b' ',
    });
    if valid {
        Ok(())
    } else {
        Err(MalformedReason::InvalidCode)
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// UTF-8 when possible, otherwise one char per byte so nothing is lost.
fn decode_line(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|err| err.into_bytes().into_iter().map(char::from).collect())
}
