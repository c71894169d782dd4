//! `multipart/mixed` attachment writer.

use crate::encoding::{encode_base64_wrapped, encode_quoted_printable, encode_rfc2047};
use crate::error::{Error, Result};

/// A file or inline part attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    data: Vec<u8>,
    name: String,
    mime_type: String,
    content_id: Option<String>,
    inline: bool,
}

impl Attachment {
    /// Creates an attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or MIME type is empty or contains line
    /// breaks.
    pub fn new(
        data: impl Into<Vec<u8>>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let mime_type = mime_type.into();

        if name.is_empty() || name.contains(['\r', '\n']) {
            return Err(Error::InvalidAttachment(format!("bad name {name:?}")));
        }
        if !mime_type.contains('/') || mime_type.contains(['\r', '\n', ' ']) {
            return Err(Error::InvalidAttachment(format!(
                "bad MIME type {mime_type:?}"
            )));
        }

        Ok(Self {
            data: data.into(),
            name,
            mime_type,
            content_id: None,
            inline: false,
        })
    }

    /// Sets the `Content-ID` used to reference the part from HTML bodies.
    #[must_use]
    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Marks the part as `inline` instead of `attachment`.
    #[must_use]
    pub const fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// File name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn is_text(&self) -> bool {
        self.mime_type
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("text/"))
    }

    fn write_to(&self, buf: &mut Vec<u8>, eight_bit: bool) {
        let name = encode_rfc2047(&self.name, "utf-8");
        let disposition = if self.inline { "inline" } else { "attachment" };

        buf.extend_from_slice(
            format!("Content-Type: {}; name=\"{name}\"\r\n", self.mime_type).as_bytes(),
        );

        let text = if self.is_text() {
            std::str::from_utf8(&self.data).ok()
        } else {
            None
        };

        let (encoding, body) = match text {
            Some(text) if eight_bit => ("8bit", normalize_line_endings(text)),
            Some(text) => (
                "quoted-printable",
                split_lines(text)
                    .map(encode_quoted_printable)
                    .collect::<Vec<_>>()
                    .join("\r\n"),
            ),
            None => ("base64", encode_base64_wrapped(&self.data)),
        };

        buf.extend_from_slice(format!("Content-Transfer-Encoding: {encoding}\r\n").as_bytes());
        buf.extend_from_slice(
            format!("Content-Disposition: {disposition}; filename=\"{name}\"\r\n").as_bytes(),
        );
        if let Some(id) = &self.content_id {
            buf.extend_from_slice(format!("Content-ID: <{id}>\r\n").as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(body.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
}

/// The multipart section of a message with attachments.
///
/// The body itself is not part of this buffer: the submitting side writes
/// the opening boundary and the body part, then appends [`to_buffer`].
///
/// [`to_buffer`]: MimeMessage::to_buffer
#[derive(Debug, Clone, Copy)]
pub struct MimeMessage<'a> {
    boundary: &'a str,
    parts: &'a [Attachment],
}

impl<'a> MimeMessage<'a> {
    pub(crate) const fn new(boundary: &'a str, parts: &'a [Attachment]) -> Self {
        Self { boundary, parts }
    }

    /// Multipart boundary token (without the leading dashes).
    #[must_use]
    pub const fn boundary(&self) -> &'a str {
        self.boundary
    }

    /// Attached parts.
    #[must_use]
    pub const fn parts(&self) -> &'a [Attachment] {
        self.parts
    }

    /// Encodes every part followed by the closing boundary.
    ///
    /// With `eight_bit` set (the server accepted `BODY=8BITMIME`), UTF-8
    /// text parts are sent as-is with `8bit` transfer encoding; otherwise
    /// they are quoted-printable. Other parts are always base64.
    #[must_use]
    pub fn to_buffer(&self, eight_bit: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        for part in self.parts {
            buf.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            part.write_to(&mut buf, eight_bit);
        }
        buf.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        buf
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    trimmed
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

fn normalize_line_endings(text: &str) -> String {
    split_lines(text).collect::<Vec<_>>().join("\r\n")
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

    fn render(parts: &[Attachment], eight_bit: bool) -> String {
        String::from_utf8(MimeMessage::new("b0und", parts).to_buffer(eight_bit)).unwrap()
    }

    #[test]
    fn test_attachment_validation() {
        assert!(Attachment::new(b"x".to_vec(), "", "text/plain").is_err());
        assert!(Attachment::new(b"x".to_vec(), "a\r\nb", "text/plain").is_err());
        assert!(Attachment::new(b"x".to_vec(), "a.txt", "plain").is_err());
        assert!(Attachment::new(b"x".to_vec(), "a.txt", "text/plain").is_ok());
    }

    #[test]
    fn test_binary_part_is_base64() {
        let part = Attachment::new(vec![0u8, 159, 146, 150], "blob.bin", "application/octet-stream")
            .unwrap();
        let out = render(&[part], true);

        assert!(out.starts_with("--b0und\r\n"));
        assert!(out.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(out.contains("Content-Disposition: attachment; filename=\"blob.bin\"\r\n"));
        assert!(out.contains("\r\n\r\nAJ+Slg==\r\n"));
        assert!(out.ends_with("--b0und--\r\n"));
    }

    #[test]
    fn test_text_part_eight_bit() {
        let part = Attachment::new("caf\u{e9}\nline two\n", "notes.txt", "text/plain").unwrap();
        let out = render(&[part], true);

        assert!(out.contains("Content-Transfer-Encoding: 8bit\r\n"));
        assert!(out.contains("\r\n\r\ncaf\u{e9}\r\nline two\r\n--b0und--"));
    }

    #[test]
    fn test_text_part_seven_bit() {
        let part = Attachment::new("caf\u{e9}\r\n", "notes.txt", "text/plain").unwrap();
        let out = render(&[part], false);

        assert!(out.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(out.contains("\r\n\r\ncaf=C3=A9\r\n--b0und--"));
    }

    #[test]
    fn test_inline_with_content_id() {
        let part = Attachment::new(vec![1u8, 2, 3], "logo.png", "image/png")
            .unwrap()
            .with_content_id("logo@postwire")
            .inline();
        let out = render(&[part], false);

        assert!(out.contains("Content-Disposition: inline; filename=\"logo.png\"\r\n"));
        assert!(out.contains("Content-ID: <logo@postwire>\r\n"));
    }

    #[test]
    fn test_multiple_parts_order() {
        let a = Attachment::new(b"a".to_vec(), "a.bin", "application/octet-stream").unwrap();
        let b = Attachment::new(b"b".to_vec(), "b.bin", "application/octet-stream").unwrap();
        let out = render(&[a, b], false);

        let first = out.find("a.bin").unwrap();
        let second = out.find("b.bin").unwrap();
        assert!(first < second);
        assert_eq!(out.matches("--b0und\r\n").count(), 2);
    }
}
