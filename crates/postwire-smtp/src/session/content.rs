//! Rendering a message into DATA content or BDAT chunks.

use postwire_mime::DEFAULT_BODY_TYPE;

use crate::message::OutboundMessage;

const CRLF: &[u8] = b"\r\n";

/// A message rendered for the wire, split where BDAT chunks are cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Payload {
    header: Vec<u8>,
    body: Vec<u8>,
    mime: Option<Vec<u8>>,
}

impl Payload {
    pub(crate) fn render<M: OutboundMessage + ?Sized>(message: &M, eight_bit: bool) -> Self {
        let mut header = Vec::new();
        for line in message.header_lines() {
            push_line(&mut header, &line);
        }

        let mime = message.mime_message();
        let mut body = Vec::new();

        if let Some(mime) = &mime {
            body.extend_from_slice(CRLF);
            push_line(&mut body, &format!("--{}", mime.boundary()));
            let body_type = message.body_type().unwrap_or(DEFAULT_BODY_TYPE);
            push_line(&mut body, &format!("Content-Type: {body_type}"));
            body.extend_from_slice(CRLF);
        } else {
            if let Some(body_type) = message.body_type() {
                push_line(&mut body, &format!("Content-Type: {body_type}"));
            }
            body.extend_from_slice(CRLF);
        }

        for line in message.body_lines() {
            push_line(&mut body, line);
        }

        let mime = mime.map(|mime| {
            body.extend_from_slice(CRLF);
            mime.to_buffer(eight_bit)
        });

        Self { header, body, mime }
    }

    /// Content for DATA, dot-stuffed. The terminator is not included.
    pub(crate) fn data(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.len());
        raw.extend_from_slice(&self.header);
        raw.extend_from_slice(&self.body);
        if let Some(mime) = &self.mime {
            raw.extend_from_slice(mime);
        }
        dot_stuff(&raw)
    }

    /// BDAT chunks in order, each paired with its LAST flag.
    pub(crate) fn chunks(&self) -> Vec<(&[u8], bool)> {
        let mut chunks = vec![
            (self.header.as_slice(), false),
            (self.body.as_slice(), self.mime.is_none()),
        ];
        if let Some(mime) = &self.mime {
            chunks.push((mime.as_slice(), true));
        }
        chunks
    }

    /// Unstuffed size in octets.
    pub(crate) fn len(&self) -> usize {
        self.header.len() + self.body.len() + self.mime.as_ref().map_or(0, Vec::len)
    }
}

fn push_line(buf: &mut Vec<u8>, line: &str) {
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(CRLF);
}

/// Doubles a `.` found at the start of any line (RFC 5321 section 4.5.2).
/// The input is assumed to start at the beginning of a line.
pub(crate) fn dot_stuff(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + content.len() / 64);
    let mut line_start = true;
    let mut previous = 0u8;

    for &byte in content {
        if line_start && byte == b'.' {
            out.push(b'.');
        }
        out.push(byte);
        line_start = previous == b'\r' && byte == b'\n';
        previous = byte;
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use postwire_mime::{Attachment, Mail, MimeMessage};

    struct Lines {
        header: Vec<String>,
        body: Vec<String>,
        body_type: Option<String>,
    }

    impl OutboundMessage for Lines {
        fn header_lines(&self) -> Vec<String> {
            self.header.clone()
        }

        fn body_lines(&self) -> &[String] {
            &self.body
        }

        fn body_type(&self) -> Option<&str> {
            self.body_type.as_deref()
        }

        fn mime_message(&self) -> Option<MimeMessage<'_>> {
            None
        }
    }

    fn lines(body_type: Option<&str>) -> Lines {
        Lines {
            header: vec!["Subject: hi".into()],
            body: vec!["first".into(), ".second".into()],
            body_type: body_type.map(str::to_string),
        }
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff(b".a\r\nb\r\n..c\r\n"), b"..a\r\nb\r\n...c\r\n");
        assert_eq!(dot_stuff(b"a.b\r\n"), b"a.b\r\n");
        // Only CRLF starts a new line.
        assert_eq!(dot_stuff(b"a\n.b\r\n"), b"a\n.b\r\n");
        assert_eq!(dot_stuff(b""), b"");
    }

    #[test]
    fn test_plain_without_body_type() {
        let payload = Payload::render(&lines(None), false);
        assert_eq!(payload.data(), b"Subject: hi\r\n\r\nfirst\r\n..second\r\n");
    }

    #[test]
    fn test_plain_with_body_type() {
        let payload = Payload::render(&lines(Some("text/html")), false);
        assert_eq!(
            payload.data(),
            b"Subject: hi\r\nContent-Type: text/html\r\n\r\nfirst\r\n..second\r\n"
        );
    }

    #[test]
    fn test_plain_chunks_are_not_stuffed() {
        let payload = Payload::render(&lines(None), false);
        let chunks = payload.chunks();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], (&b"Subject: hi\r\n"[..], false));
        assert_eq!(chunks[1], (&b"\r\nfirst\r\n.second\r\n"[..], true));
        assert_eq!(
            chunks.iter().map(|(chunk, _)| chunk.len()).sum::<usize>(),
            payload.len()
        );
    }

    #[test]
    fn test_mime_layout() {
        let mut mail = Mail::new();
        mail.add_field("Subject", "report").unwrap();
        mail.set_body(["see attached"]);
        mail.add_attachment(Attachment::new(b"a,b\n".to_vec(), "data.csv", "text/csv").unwrap());
        let boundary = mail.mime_message().unwrap().boundary().to_string();

        let payload = Payload::render(&mail, true);
        let chunks = payload.chunks();
        assert_eq!(chunks.len(), 3);
        assert!(!chunks[1].1);
        assert!(chunks[2].1);

        let body = String::from_utf8(chunks[1].0.to_vec()).unwrap();
        assert_eq!(
            body,
            format!("\r\n--{boundary}\r\nContent-Type: text/plain\r\n\r\nsee attached\r\n\r\n")
        );

        let multipart = String::from_utf8(chunks[2].0.to_vec()).unwrap();
        assert!(multipart.starts_with(&format!("--{boundary}\r\n")));
        assert!(multipart.ends_with(&format!("--{boundary}--\r\n")));
        assert!(multipart.contains("Content-Transfer-Encoding: 8bit"));

        let header = String::from_utf8(chunks[0].0.to_vec()).unwrap();
        assert!(header.contains("MIME-Version: 1.0\r\n"));
    }
}
