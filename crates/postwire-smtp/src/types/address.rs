//! Envelope addresses.
//!
//! Addresses are recognised with a deliberately simple `local@domain.tld`
//! shape: local part `[A-Za-z0-9._%+-]+`, domain `[A-Za-z0-9.-]+`, final
//! label of 2 to 4 letters.

use crate::error::{Error, Result};

/// Email address for the SMTP envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates an address, requiring the whole input to match.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        match Self::find(&addr) {
            Some(found) if found.0 == addr => Ok(found),
            _ => Err(Error::InvalidArgument(format!("invalid address {addr:?}"))),
        }
    }

    /// Finds the leftmost address inside `text`, e.g. in `Jane <jane@example.org>`.
    #[must_use]
    pub fn find(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();

        for at in positions(b'@', bytes) {
            let start = bytes[..at]
                .iter()
                .rposition(|&b| !is_local_char(b))
                .map_or(0, |i| i + 1);
            if start == at {
                continue;
            }
            if let Some(end) = domain_end(bytes, at + 1) {
                return Some(Self(text[start..end].to_string()));
            }
        }
        None
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds the envelope recipient list.
///
/// Every candidate may hold several comma separated entries. Entries with
/// no recognisable address are dropped. Order is preserved.
pub fn collect_recipients<'a, I>(candidates: I) -> Vec<Address>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .flat_map(|candidate| candidate.split(','))
        .filter_map(Address::find)
        .collect()
}

fn positions(needle: u8, haystack: &[u8]) -> impl Iterator<Item = usize> + '_ {
    haystack
        .iter()
        .enumerate()
        .filter_map(move |(i, &b)| (b == needle).then_some(i))
}

const fn is_local_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'%' | b'+' | b'-')
}

const fn is_domain_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-')
}

/// End of the longest `domain.tld` starting at `from`, if any.
fn domain_end(bytes: &[u8], from: usize) -> Option<usize> {
    let run = bytes[from..].iter().take_while(|&&b| is_domain_char(b)).count();

    // The domain needs at least one character before the final dot.
    (from + 1..from + run).rev().find_map(|dot| {
        if bytes[dot] != b'.' {
            return None;
        }
        let letters = bytes[dot + 1..]
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        (2..=4).contains(&letters).then_some(dot + 1 + letters)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn found(text: &str) -> Option<String> {
        Address::find(text).map(|a| a.as_str().to_string())
    }

    #[test]
    fn test_address_valid() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_address_invalid() {
        assert!(Address::new("").is_err());
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("user@localhost").is_err());
        assert!(Address::new("Jane <user@example.com>").is_err());
    }

    #[test]
    fn test_find_in_display_form() {
        assert_eq!(found("Jane Doe <jane.doe@mail.example.org>").as_deref(), Some("jane.doe@mail.example.org"));
        assert_eq!(found("<a+tag@b.io>").as_deref(), Some("a+tag@b.io"));
    }

    #[test]
    fn test_find_leftmost() {
        assert_eq!(found("x@y.com and z@w.com").as_deref(), Some("x@y.com"));
        assert_eq!(found("@ nobody@example.net").as_deref(), Some("nobody@example.net"));
    }

    #[test]
    fn test_find_top_level_label_length() {
        // A longer label is rejected rather than cut short.
        assert_eq!(found("a@b.museum").as_deref(), None);
        assert_eq!(found("a@b.info").as_deref(), Some("a@b.info"));
        assert_eq!(found("a@b.c").as_deref(), None);
        assert_eq!(found("a@b.com.x").as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_find_none() {
        assert_eq!(found("no address here"), None);
        assert_eq!(found("user@.com"), None);
    }

    #[test]
    fn test_collect_recipients() {
        let recipients = collect_recipients([
            "first@example.com",
            "Second <second@example.com>, third@example.com",
            "not an address",
            "",
        ]);
        let recipients: Vec<&str> = recipients.iter().map(Address::as_str).collect();
        assert_eq!(
            recipients,
            vec!["first@example.com", "second@example.com", "third@example.com"]
        );
    }
}
