//! # postwire-smtp
//!
//! An async SMTP client implementing RFC 5321 with the 8BITMIME, STARTTLS,
//! AUTH LOGIN and CHUNKING extensions.
//!
//! ## Features
//!
//! - **Incremental reply parser**: multi-line three-digit replies parsed
//!   from arbitrarily split chunks
//! - **Half-duplex command engine**: one outstanding command at a time,
//!   enforced by an explicit state machine
//! - **Session flows**: EHLO with HELO fallback, STARTTLS, AUTH LOGIN,
//!   MAIL/RCPT followed by DATA or BDAT
//! - **TLS**: implicit TLS (port 465) and STARTTLS through rustls
//! - **One-shot send**: [`send`] for the common connect-to-quit case
//!
//! ## Quick Start
//!
//! ```ignore
//! use postwire_mime::create_message;
//! use postwire_smtp::{Config, SendOptions, send};
//!
//! #[tokio::main]
//! async fn main() -> postwire_smtp::Result<()> {
//!     let mail = create_message(
//!         "sender@example.com",
//!         &["recipient@example.com"],
//!         "Hello",
//!         "Hello, World!",
//!     )?;
//!
//!     let options = SendOptions::new(Config::new("smtp.example.com"))
//!         .with_credentials("sender@example.com", "password");
//!
//!     let status = send(&options, &mail).await?;
//!     println!("{}: {:?}", status.action, status.lines);
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! ```text
//! send()  ──→  Session  ──→  SmtpClient  ──→  ThreeDigitReply
//! facade       flows         commands         reply parser
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command serialization
//! - [`connection`]: Transport, configuration and the command engine
//! - [`parser`]: Reply parser
//! - [`session`]: Multi-step flows
//! - [`types`]: Replies, extensions and addresses

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
mod message;
pub mod parser;
mod send;
pub mod session;
pub mod types;

pub use connection::{Config, ConnectionState, Security, SmtpClient, SmtpStream, TlsUpgrade};
pub use error::{Error, Result};
pub use message::OutboundMessage;
pub use send::{Action, Credentials, SendOptions, SendStatus, send, send_over};
pub use session::{HelloOutcome, Outcome, Session, SessionState};
pub use types::{Address, AuthMechanism, Capabilities, Extension, Reply, ReplyCode, Response};
