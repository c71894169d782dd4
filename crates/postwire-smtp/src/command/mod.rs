//! SMTP command builder.

use crate::connection::CommandKind;
use crate::error::{Error, Result};
use crate::types::AuthMechanism;
use std::fmt;

/// SMTP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting (empty domain sends the bare verb)
    Helo {
        /// Client domain
        domain: String,
    },
    /// EHLO - Extended greeting (empty domain sends the bare verb)
    Ehlo {
        /// Client domain
        domain: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH - Begin authentication
    Auth {
        /// Authentication mechanism
        mechanism: AuthMechanism,
        /// Initial response (optional, for SASL-IR)
        initial_response: Option<String>,
    },
    /// Base64 response to an AUTH challenge
    AuthResponse(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Reverse path, sent verbatim between `FROM:` and the parameters
        from: String,
        /// Adds `BODY=8BITMIME`
        eight_bit_mime: bool,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Forward path, sent verbatim after `TO:`
        to: String,
    },
    /// DATA - Begin message data
    Data,
    /// `.` line ending DATA content
    EndOfData,
    /// BDAT - Chunk header, the payload follows immediately
    Bdat {
        /// Octet count of the chunk
        size: usize,
        /// Marks the final chunk
        last: bool,
    },
    /// RSET - Reset transaction
    Rset,
    /// VRFY - Verify address
    Vrfy {
        /// User or mailbox to verify
        user: String,
    },
    /// EXPN - Expand mailing list
    Expn {
        /// Mailing list to expand
        list: String,
    },
    /// HELP - Request help
    Help {
        /// Optional topic
        topic: Option<String>,
    },
    /// NOOP - No operation
    Noop {
        /// Optional argument, ignored by servers
        argument: Option<String>,
    },
    /// QUIT - Close connection
    Quit,
    /// Any other command line
    Raw(String),
}

impl Command {
    /// Serializes the command to bytes, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Helo { domain } => with_argument(&mut buf, "HELO", domain),
            Self::Ehlo { domain } => with_argument(&mut buf, "EHLO", domain),
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTH ");
                buf.extend_from_slice(mechanism.as_str().as_bytes());
                if let Some(resp) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(resp.as_bytes());
                }
            }
            Self::AuthResponse(line) | Self::Raw(line) => buf.extend_from_slice(line.as_bytes()),
            Self::MailFrom {
                from,
                eight_bit_mime,
            } => {
                buf.extend_from_slice(b"MAIL FROM:");
                buf.extend_from_slice(from.as_bytes());
                if *eight_bit_mime {
                    buf.extend_from_slice(b" BODY=8BITMIME");
                }
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:");
                buf.extend_from_slice(to.as_bytes());
            }
            Self::Data => buf.extend_from_slice(b"DATA"),
            Self::EndOfData => buf.push(b'.'),
            Self::Bdat { size, last } => {
                buf.extend_from_slice(format!("BDAT {size}").as_bytes());
                if *last {
                    buf.extend_from_slice(b" LAST");
                }
            }
            Self::Rset => buf.extend_from_slice(b"RSET"),
            Self::Vrfy { user } => with_argument(&mut buf, "VRFY", user),
            Self::Expn { list } => with_argument(&mut buf, "EXPN", list),
            Self::Help { topic } => with_argument(&mut buf, "HELP", topic.as_deref().unwrap_or("")),
            Self::Noop { argument } => {
                with_argument(&mut buf, "NOOP", argument.as_deref().unwrap_or(""));
            }
            Self::Quit => buf.extend_from_slice(b"QUIT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// The awaiting-reply state entered once this command is written.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Helo { .. } => CommandKind::Helo,
            Self::Ehlo { .. } => CommandKind::Ehlo,
            Self::StartTls => CommandKind::StartTls,
            Self::Auth { .. } | Self::AuthResponse(_) => CommandKind::Auth,
            Self::MailFrom { .. } => CommandKind::Mail,
            Self::RcptTo { .. } => CommandKind::Rcpt,
            Self::Data => CommandKind::Data,
            Self::EndOfData => CommandKind::Content,
            Self::Bdat { .. } => CommandKind::Bdat,
            Self::Rset => CommandKind::Rset,
            Self::Vrfy { .. } => CommandKind::Vrfy,
            Self::Expn { .. } => CommandKind::Expn,
            Self::Help { .. } => CommandKind::Help,
            Self::Noop { .. } => CommandKind::Noop,
            Self::Quit => CommandKind::Quit,
            Self::Raw(_) => CommandKind::Raw,
        }
    }

    /// Rejects arguments that would break the command line framing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if an argument contains CR or LF, or if a
    /// required argument is empty.
    pub fn validate(&self) -> Result<()> {
        let (name, value, required) = match self {
            Self::Helo { domain } | Self::Ehlo { domain } => ("domain", domain.as_str(), false),
            Self::AuthResponse(line) => ("response", line.as_str(), false),
            Self::Raw(line) => ("command", line.as_str(), true),
            Self::MailFrom { from, .. } => ("sender", from.as_str(), true),
            Self::RcptTo { to } => ("recipient", to.as_str(), true),
            Self::Vrfy { user } => ("user", user.as_str(), true),
            Self::Expn { list } => ("list", list.as_str(), true),
            Self::Help { topic } => ("topic", topic.as_deref().unwrap_or(""), false),
            Self::Noop { argument } => ("argument", argument.as_deref().unwrap_or(""), false),
            Self::Auth {
                initial_response, ..
            } => ("initial response", initial_response.as_deref().unwrap_or(""), false),
            Self::StartTls
            | Self::Data
            | Self::EndOfData
            | Self::Bdat { .. }
            | Self::Rset
            | Self::Quit => return Ok(()),
        };

        if required && value.is_empty() {
            return Err(Error::InvalidArgument(format!("{name} must not be empty")));
        }
        if value.contains(['\r', '\n']) {
            return Err(Error::InvalidArgument(format!(
                "{name} must not contain CR or LF"
            )));
        }
        Ok(())
    }
}

/// Shown in logs: AUTH payloads are masked.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthResponse(_) => f.write_str("<credentials>"),
            Self::Auth {
                mechanism,
                initial_response: Some(_),
            } => write!(f, "AUTH {} <credentials>", mechanism.as_str()),
            _ => {
                let line = self.serialize();
                let text = String::from_utf8_lossy(&line);
                f.write_str(text.trim_end())
            }
        }
    }
}

fn with_argument(buf: &mut Vec<u8>, verb: &str, argument: &str) {
    buf.extend_from_slice(verb.as_bytes());
    if !argument.is_empty() {
        buf.push(b' ');
        buf.extend_from_slice(argument.as_bytes());
    }
}
