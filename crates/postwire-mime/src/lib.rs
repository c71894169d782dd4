//! # postwire-mime
//!
//! Outbound email message model for SMTP submission.
//!
//! ## Features
//!
//! - **Ordered header fields**: multimap storage, rendered in insertion order
//! - **Formatted bodies**: free text split into RFC 5322 lines
//! - **Attachments**: `multipart/mixed` writer with base64, quoted-printable
//!   or 8bit parts
//!
//! ## Quick Start
//!
//! ```ignore
//! use postwire_mime::{Attachment, create_message};
//!
//! let mut mail = create_message(
//!     "sender@example.com",
//!     &["recipient@example.com"],
//!     "Quarterly report",
//!     "Please find the report attached.",
//! )?;
//! mail.add_attachment(Attachment::new(bytes, "report.pdf", "application/pdf")?);
//!
//! for line in mail.header_lines() {
//!     println!("{line}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod header;
mod mail;
mod multipart;

pub mod encoding;

pub use error::{Error, Result};
pub use header::Headers;
pub use mail::{DEFAULT_BODY_TYPE, MAXIMUM_LINE_LENGTH, Mail, create_message};
pub use multipart::{Attachment, MimeMessage};
