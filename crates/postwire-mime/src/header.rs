//! Header field storage.

use crate::error::{Error, Result};
use std::fmt;

/// Field names rendered with a fixed capitalisation regardless of how they
/// were added.
const CANONICAL_NAMES: &[&str] = &["From", "To", "Cc", "Bcc", "Subject", "Organization"];

/// A header field with one or more values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    values: Vec<String>,
}

/// Ordered multimap of header fields.
///
/// Field names are matched case-insensitively. Fields keep the position of
/// their first insertion; repeated values of the same field are rendered
/// together in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value, keeping any existing values for the same field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field name or value is invalid.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        validate_name(&name)?;
        validate_value(&name, &value)?;

        match self.position(&name) {
            Some(index) => self.fields[index].values.push(value),
            None => self.fields.push(Field {
                name,
                values: vec![value],
            }),
        }
        Ok(())
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// # Errors
    ///
    /// Returns an error if the field name or value is invalid.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        validate_name(&name)?;
        validate_value(&name, &value)?;

        match self.position(&name) {
            Some(index) => self.fields[index].values = vec![value],
            None => self.fields.push(Field {
                name,
                values: vec![value],
            }),
        }
        Ok(())
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|i| self.fields[i].values.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.position(name)
            .map(|i| self.fields[i].values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.name.eq_ignore_ascii_case(name));
    }

    /// Removes a single value from a header. Returns `true` if it was present.
    pub fn remove_value(&mut self, name: &str, value: &str) -> bool {
        let Some(index) = self.position(name) else {
            return false;
        };

        let values = &mut self.fields[index].values;
        let Some(pos) = values.iter().position(|v| v == value) else {
            return false;
        };
        values.remove(pos);

        if values.is_empty() {
            self.fields.remove(index);
        }
        true
    }

    /// Returns `true` if the header has at least one value for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns `true` if no fields are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .flat_map(|f| f.values.iter().map(move |v| (display_name(&f.name), v.as_str())))
    }

    /// Renders the header as `Name: value` lines without line terminators.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.iter().map(|(name, value)| format!("{name}: {value}")).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

fn display_name(name: &str) -> &str {
    CANONICAL_NAMES
        .iter()
        .find(|canonical| canonical.eq_ignore_ascii_case(name))
        .copied()
        .unwrap_or(name)
}

/// Field names are printable US-ASCII except colon (RFC 5322 section 2.2).
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| (0x21..=0x7e).contains(&b) && b != b':');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidFieldName(name.to_string()))
    }
}

/// Values may be folded, so CRLF is allowed only when followed by WSP.
fn validate_value(name: &str, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\r' => {
                let folded = bytes.get(i + 1) == Some(&b'\n')
                    && matches!(bytes.get(i + 2), Some(b' ' | b'\t'));
                if !folded {
                    return Err(Error::InvalidFieldValue {
                        name: name.to_string(),
                        reason: "CR must start a folding CRLF WSP sequence",
                    });
                }
            }
            b'\n' if i == 0 || bytes[i - 1] != b'\r' => {
                return Err(Error::InvalidFieldValue {
                    name: name.to_string(),
                    reason: "bare LF",
                });
            }
            _ => {}
        }
    }
    Ok(())
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
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain").unwrap();
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com").unwrap();
        headers.add("To", "bob@example.com").unwrap();
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("To", "charlie@example.com").unwrap();
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test").unwrap();
        headers.remove("subject");
        assert!(headers.get("Subject").is_none());
    }

    #[test]
    fn test_headers_remove_value() {
        let mut headers = Headers::new();
        headers.add("Comments", "one").unwrap();
        headers.add("Comments", "two").unwrap();

        assert!(headers.remove_value("Comments", "one"));
        assert!(!headers.remove_value("Comments", "one"));
        assert_eq!(headers.get_all("Comments"), vec!["two"]);

        assert!(headers.remove_value("Comments", "two"));
        assert!(!headers.contains("Comments"));
    }

    #[test]
    fn test_lines_keep_insertion_order() {
        let mut headers = Headers::new();
        headers.add("subject", "Hi").unwrap();
        headers.add("X-Mailer", "postwire").unwrap();
        headers.add("to", "a@example.com").unwrap();
        headers.add("TO", "b@example.com").unwrap();

        assert_eq!(
            headers.lines(),
            vec![
                "Subject: Hi",
                "X-Mailer: postwire",
                "To: a@example.com",
                "To: b@example.com",
            ]
        );
    }

    #[test]
    fn test_invalid_field_names() {
        let mut headers = Headers::new();
        assert!(headers.add("", "x").is_err());
        assert!(headers.add("Bad:Name", "x").is_err());
        assert!(headers.add("Bad Name", "x").is_err());
        assert!(headers.add("Bad\u{e9}", "x").is_err());
    }

    #[test]
    fn test_folded_value_allowed() {
        let mut headers = Headers::new();
        headers.add("Subject", "first\r\n second").unwrap();
        assert!(headers.add("Subject", "broken\r\nInjected: yes").is_err());
        assert!(headers.add("Subject", "bare\nlf").is_err());
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("from", "sender@example.com").unwrap();
        headers.add("to", "recipient@example.com").unwrap();

        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\r\nTo: recipient@example.com\r\n"
        );
    }
}
