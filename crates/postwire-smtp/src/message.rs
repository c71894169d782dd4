//! What the session needs from a message.

use postwire_mime::{Mail, MimeMessage};

/// A message ready for submission: pre-formatted header and body lines plus
/// an optional encoded multipart section.
pub trait OutboundMessage {
    /// Header lines without line terminators, in wire order.
    fn header_lines(&self) -> Vec<String>;

    /// Body lines without line terminators.
    fn body_lines(&self) -> &[String];

    /// MIME type of the body, if one should be declared.
    fn body_type(&self) -> Option<&str>;

    /// Multipart section for messages with attachments.
    fn mime_message(&self) -> Option<MimeMessage<'_>>;

    /// Recipients beyond the explicit list, such as Cc and Bcc values.
    fn extra_recipients(&self) -> Vec<String> {
        Vec::new()
    }
}

impl OutboundMessage for Mail {
    fn header_lines(&self) -> Vec<String> {
        Mail::header_lines(self)
    }

    fn body_lines(&self) -> &[String] {
        self.body()
    }

    fn body_type(&self) -> Option<&str> {
        let body_type = Mail::body_type(self);
        (!body_type.is_empty()).then_some(body_type)
    }

    fn mime_message(&self) -> Option<MimeMessage<'_>> {
        Mail::mime_message(self)
    }

    fn extra_recipients(&self) -> Vec<String> {
        ["Cc", "Bcc"]
            .into_iter()
            .flat_map(|field| self.field_values(field))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use postwire_mime::create_message;

    #[test]
    fn test_mail_extra_recipients_cc_then_bcc() {
        let mut mail = create_message("a@example.com", &["b@example.com"], "Hi", "body").unwrap();
        mail.add_field("Bcc", "hidden@example.com").unwrap();
        mail.add_field("Cc", "Carol <carol@example.com>").unwrap();

        assert_eq!(
            mail.extra_recipients(),
            ["Carol <carol@example.com>", "hidden@example.com"]
        );
    }

    #[test]
    fn test_mail_body_defaults() {
        let mail = create_message("a@example.com", &["b@example.com"], "Hi", "one\ntwo").unwrap();

        assert_eq!(OutboundMessage::body_lines(&mail), ["one", "two"]);
        assert_eq!(OutboundMessage::body_type(&mail), Some("text/plain"));
        assert!(OutboundMessage::mime_message(&mail).is_none());
    }
}
