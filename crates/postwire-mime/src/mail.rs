//! Outbound email message.

use crate::error::Result;
use crate::header::Headers;
use crate::multipart::{Attachment, MimeMessage};
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum line length excluding CRLF (RFC 5322 section 2.1.1).
pub const MAXIMUM_LINE_LENGTH: usize = 998;

/// Default body type.
pub const DEFAULT_BODY_TYPE: &str = "text/plain";

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An email message ready for submission.
///
/// The body is stored as lines without terminators. Lines are kept
/// unstuffed; dot-stuffing is the transport's job since it only applies to
/// `DATA` transfers.
#[derive(Debug, Clone)]
pub struct Mail {
    headers: Headers,
    body: Vec<String>,
    body_type: String,
    attachments: Vec<Attachment>,
    boundary: String,
}

impl Default for Mail {
    fn default() -> Self {
        Self::new()
    }
}

impl Mail {
    /// Creates an empty message with a `text/plain` body type.
    #[must_use]
    pub fn new() -> Self {
        Self {
            headers: Headers::new(),
            body: Vec::new(),
            body_type: DEFAULT_BODY_TYPE.to_string(),
            attachments: Vec::new(),
            boundary: generate_boundary(),
        }
    }

    /// Header fields.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable header fields.
    pub const fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Adds a header field value.
    ///
    /// # Errors
    ///
    /// Returns an error if the field name or value is invalid.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.headers.add(name, value)
    }

    /// Returns the first value of a header field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns every value of a header field.
    #[must_use]
    pub fn field_values(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(name)
    }

    /// Header lines ready for transmission (CRLF must be appended).
    ///
    /// Messages with attachments replace any user `Content-Type` and
    /// `MIME-Version` fields with a `multipart/mixed` declaration.
    #[must_use]
    pub fn header_lines(&self) -> Vec<String> {
        if self.attachments.is_empty() {
            return self.headers.lines();
        }

        let mut lines: Vec<String> = self
            .headers
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case("content-type") && !name.eq_ignore_ascii_case("mime-version")
            })
            .map(|(name, value)| format!("{name}: {value}"))
            .collect();
        lines.push("MIME-Version: 1.0".to_string());
        lines.push(format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"",
            self.boundary
        ));
        lines
    }

    /// Replaces the body with already formatted lines.
    pub fn set_body<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body = lines.into_iter().map(Into::into).collect();
    }

    /// Same as [`set_body`](Self::set_body) and switches the body type to HTML.
    pub fn set_body_as_html<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_body(lines);
        self.set_body_type_to_html();
    }

    /// Body lines.
    #[must_use]
    pub fn body(&self) -> &[String] {
        &self.body
    }

    /// Sets the body MIME type.
    pub fn set_body_type(&mut self, body_type: impl Into<String>) {
        self.body_type = body_type.into();
    }

    /// Sets the body MIME type to `text/html`.
    pub fn set_body_type_to_html(&mut self) {
        self.body_type = "text/html".to_string();
    }

    /// Body MIME type.
    #[must_use]
    pub fn body_type(&self) -> &str {
        &self.body_type
    }

    /// Formats free text into body lines.
    ///
    /// CRLF and LF both end a line, a lone CR becomes a space. Returns
    /// `false` and leaves the current body untouched if any line exceeds
    /// `line_limit` octets ([`MAXIMUM_LINE_LENGTH`] when `None`).
    pub fn set_content(&mut self, content: &str, line_limit: Option<usize>) -> bool {
        let limit = line_limit.unwrap_or(MAXIMUM_LINE_LENGTH);
        let normalized = content.replace("\r\n", "\n").replace('\r', " ");
        let trimmed = normalized.strip_suffix('\n').unwrap_or(&normalized);

        let lines: Vec<String> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('\n').map(str::to_string).collect()
        };

        if lines.iter().any(|line| line.len() > limit) {
            return false;
        }

        self.body = lines;
        true
    }

    /// Body as a single LF-separated string.
    #[must_use]
    pub fn content(&self) -> String {
        self.body.join("\n")
    }

    /// Attaches a part. The message becomes `multipart/mixed`.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Returns `true` if the message carries attachments.
    #[must_use]
    pub fn is_mime(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// The multipart section, if the message has attachments.
    #[must_use]
    pub fn mime_message(&self) -> Option<MimeMessage<'_>> {
        if self.attachments.is_empty() {
            None
        } else {
            Some(MimeMessage::new(&self.boundary, &self.attachments))
        }
    }
}

/// Builds a ready to send message with `From`, one `To` per recipient,
/// `Subject`, `Date` and a formatted body.
///
/// # Errors
///
/// Returns an error if a field value is invalid. Lines longer than
/// [`MAXIMUM_LINE_LENGTH`] are rejected as an invalid `Body` value.
pub fn create_message(from: &str, to: &[&str], subject: &str, content: &str) -> Result<Mail> {
    let mut mail = Mail::new();
    mail.add_field("From", from)?;
    for recipient in to {
        mail.add_field("To", *recipient)?;
    }
    mail.add_field("Subject", subject)?;
    mail.add_field("Date", chrono::Utc::now().to_rfc2822())?;

    if !mail.set_content(content, None) {
        return Err(crate::Error::InvalidFieldValue {
            name: "Body".to_string(),
            reason: "line exceeds 998 octets",
        });
    }
    Ok(mail)
}

fn generate_boundary() -> String {
    let count = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    format!("=_postwire_{nanos:x}_{count:x}")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_body_type() {
        let mail = Mail::new();
        assert_eq!(mail.body_type(), "text/plain");
        assert!(mail.body().is_empty());
        assert!(mail.mime_message().is_none());
    }

    #[test]
    fn test_set_content_splits_lines() {
        let mut mail = Mail::new();
        assert!(mail.set_content("one\r\ntwo\nthree\rstill three\n", None));
        assert_eq!(mail.body(), ["one", "two", "three still three"]);
    }

    #[test]
    fn test_set_content_keeps_blank_lines() {
        let mut mail = Mail::new();
        assert!(mail.set_content("para one\r\n\r\npara two", None));
        assert_eq!(mail.body(), ["para one", "", "para two"]);
    }

    #[test]
    fn test_set_content_line_limit() {
        let mut mail = Mail::new();
        mail.set_body(["kept"]);
        assert!(!mail.set_content("short\nthis line is too long", Some(10)));
        assert_eq!(mail.body(), ["kept"]);
    }

    #[test]
    fn test_content_round_trips_body() {
        let mut mail = Mail::new();
        mail.set_body([".hidden", "visible"]);
        assert_eq!(mail.content(), ".hidden\nvisible");
    }

    #[test]
    fn test_set_body_as_html() {
        let mut mail = Mail::new();
        mail.set_body_as_html(["<p>hi</p>"]);
        assert_eq!(mail.body_type(), "text/html");
    }

    #[test]
    fn test_header_lines_plain() {
        let mut mail = Mail::new();
        mail.add_field("from", "a@example.com").unwrap();
        mail.add_field("Content-Type", "text/plain; charset=utf-8").unwrap();

        assert_eq!(
            mail.header_lines(),
            vec!["From: a@example.com", "Content-Type: text/plain; charset=utf-8"]
        );
    }

    #[test]
    fn test_header_lines_with_attachment() {
        let mut mail = Mail::new();
        mail.add_field("From", "a@example.com").unwrap();
        mail.add_field("Content-Type", "text/html").unwrap();
        mail.add_attachment(
            Attachment::new(b"x".to_vec(), "x.bin", "application/octet-stream").unwrap(),
        );

        let boundary = mail.mime_message().unwrap().boundary().to_string();
        let lines = mail.header_lines();

        assert_eq!(lines[0], "From: a@example.com");
        assert_eq!(lines[1], "MIME-Version: 1.0");
        assert_eq!(
            lines[2],
            format!("Content-Type: multipart/mixed; boundary=\"{boundary}\"")
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_boundaries_are_unique() {
        let a = Mail::new();
        let b = Mail::new();
        assert_ne!(a.boundary, b.boundary);
    }

    #[test]
    fn test_create_message() {
        let mail = create_message(
            "me@example.com",
            &["you@example.com", "them@example.com"],
            "Hello",
            "Line one\nLine two\n",
        )
        .unwrap();

        assert_eq!(mail.field("From"), Some("me@example.com"));
        assert_eq!(
            mail.field_values("To"),
            vec!["you@example.com", "them@example.com"]
        );
        assert_eq!(mail.field("Subject"), Some("Hello"));
        assert!(mail.field("Date").is_some());
        assert_eq!(mail.body(), ["Line one", "Line two"]);
    }

    #[test]
    fn test_create_message_rejects_long_line() {
        let long = "x".repeat(MAXIMUM_LINE_LENGTH + 1);
        assert!(create_message("me@example.com", &[], "s", &long).is_err());
    }
}
