//! Transfer encodings used when writing MIME parts.
//!
//! Supports Base64 (wrapped at 76 columns), Quoted-Printable, and RFC 2047
//! encoded words for header parameters.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for Base64 and Quoted-Printable (RFC 2045).
pub const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-separated lines of at most
/// [`MAX_LINE_LENGTH`] characters. The result has no trailing CRLF.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    // Base64 output is pure ASCII, so byte chunks are valid char boundaries.
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        result.push_str(&String::from_utf8_lossy(chunk));
    }

    result
}

/// Encodes one line of text using Quoted-Printable encoding (RFC 2045).
///
/// The input must not contain line breaks; soft line breaks (`=\r\n`) are
/// inserted to keep encoded lines within [`MAX_LINE_LENGTH`].
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::new();
    let mut line_length = 0;
    let bytes = text.as_bytes();

    for (i, byte) in bytes.iter().enumerate() {
        if line_length >= MAX_LINE_LENGTH - 3 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        let is_last = i + 1 == bytes.len();
        match byte {
            b'!'..=b'<' | b'>'..=b'~' => {
                result.push(char::from(*byte));
                line_length += 1;
            }
            // Trailing whitespace would be stripped by relays.
            b' ' | b'\t' if !is_last => {
                result.push(char::from(*byte));
                line_length += 1;
            }
            _ => {
                let _ = write!(result, "={byte:02X}");
                line_length += 3;
            }
        }
    }

    result
}

/// Encodes a header parameter using RFC 2047 (`=?charset?B?...?=`) when it
/// contains characters that cannot appear verbatim.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '=' && c != '?')
    {
        return text.to_string();
    }

    let encoded = encode_base64(text.as_bytes());
    format!("=?{charset}?B?{encoded}?=")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_quoted_printable(encoded: &str) -> Vec<u8> {
        let joined = encoded.replace("=\r\n", "");
        let bytes = joined.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'=' {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        out
    }

    #[test]
    fn test_base64_encode() {
        assert_eq!(encode_base64(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
    }

    #[test]
    fn test_base64_wrapped_line_lengths() {
        let data = vec![0xA5u8; 200];
        let encoded = encode_base64_wrapped(&data);
        let lines: Vec<&str> = encoded.split("\r\n").collect();

        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| l.len() <= MAX_LINE_LENGTH));
        assert_eq!(lines.concat(), encode_base64(&data));
        assert!(!encoded.ends_with("\r\n"));
    }

    #[test]
    fn test_base64_wrapped_empty() {
        assert_eq!(encode_base64_wrapped(b""), "");
    }

    #[test]
    fn test_quoted_printable_plain_ascii() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_non_ascii() {
        let encoded = encode_quoted_printable("Héllo");
        assert_eq!(encoded, "H=C3=A9llo");
    }

    #[test]
    fn test_quoted_printable_equals_sign() {
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable("end "), "end=20");
        assert_eq!(encode_quoted_printable("a b"), "a b");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let long = "x".repeat(200);
        let encoded = encode_quoted_printable(&long);
        assert!(encoded.contains("=\r\n"));
        assert!(encoded.split("\r\n").all(|l| l.len() <= MAX_LINE_LENGTH));
    }

    #[test]
    fn test_rfc2047_passthrough() {
        assert_eq!(encode_rfc2047("report.pdf", "utf-8"), "report.pdf");
    }

    #[test]
    fn test_rfc2047_encoded() {
        let encoded = encode_rfc2047("résumé.pdf", "utf-8");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    proptest! {
        #[test]
        fn prop_quoted_printable_lines_fit(text in "[ -~\t\u{e0}-\u{ff}\u{4e00}-\u{4e10}]{0,300}") {
            let encoded = encode_quoted_printable(&text);
            prop_assert!(encoded.is_ascii());
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
            prop_assert!(!encoded.ends_with(' ') && !encoded.ends_with('\t'));
            prop_assert_eq!(decode_quoted_printable(&encoded), text.as_bytes());
        }

        #[test]
        fn prop_base64_wrapped_joins_to_single_line(data in proptest::collection::vec(any::<u8>(), 0..600)) {
            let wrapped = encode_base64_wrapped(&data);
            let lines: Vec<&str> = wrapped.split("\r\n").collect();
            prop_assert!(lines.iter().all(|l| l.len() <= MAX_LINE_LENGTH));
            prop_assert_eq!(lines.concat(), encode_base64(&data));
        }
    }
}
