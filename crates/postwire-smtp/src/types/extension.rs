//! EHLO keywords and the capability queries built on them.

/// An ESMTP service extension advertised in an EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `STARTTLS` (RFC 3207)
    StartTls,
    /// `AUTH` with its SASL mechanisms (RFC 4954)
    Auth(Vec<AuthMechanism>),
    /// `SIZE` with the optional limit in octets (RFC 1870)
    Size(Option<usize>),
    /// `8BITMIME` (RFC 6152)
    EightBitMime,
    /// `PIPELINING` (RFC 2920)
    Pipelining,
    /// `CHUNKING`, enables BDAT (RFC 3030)
    Chunking,
    /// `SMTPUTF8` (RFC 6531)
    SmtpUtf8,
    /// `DSN` (RFC 3461)
    Dsn,
    /// `BINARYMIME` (RFC 3030)
    BinaryMime,
    /// Any other keyword, kept as the full line.
    Unknown(String),
}

impl Extension {
    /// Parses an extension line from EHLO response (code prefix already
    /// removed).
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Self::Unknown(line.to_string());
        };

        let keyword = keyword.to_ascii_uppercase();

        // Pre-RFC 4954 servers announce `AUTH=LOGIN PLAIN`.
        if let Some(first) = keyword.strip_prefix("AUTH=") {
            let mechanisms = std::iter::once(first)
                .chain(parts)
                .filter_map(AuthMechanism::parse)
                .collect();
            return Self::Auth(mechanisms);
        }

        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(parts.filter_map(AuthMechanism::parse).collect()),
            "SIZE" => Self::Size(parts.next().and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "CHUNKING" => Self::Chunking,
            "SMTPUTF8" => Self::SmtpUtf8,
            "DSN" => Self::Dsn,
            "BINARYMIME" => Self::BinaryMime,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL mechanism named on an AUTH line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// `PLAIN`
    Plain,
    /// `LOGIN`, the mechanism used by [`Session::authenticate`](crate::Session::authenticate)
    Login,
    /// `CRAM-MD5`
    CramMd5,
    /// `XOAUTH2`
    XOAuth2,
    /// `OAUTHBEARER` (RFC 7628)
    OAuthBearer,
}

impl AuthMechanism {
    /// Case-insensitive lookup of a mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            "OAUTHBEARER" => Some(Self::OAuthBearer),
            _ => None,
        }
    }

    /// Name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }
}

/// Server capabilities from the most recent EHLO response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    extensions: Vec<Extension>,
}

impl Capabilities {
    /// Classifies extension lines as returned by
    /// [`SmtpClient::extensions`](crate::SmtpClient::extensions).
    #[must_use]
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        Self {
            extensions: lines.iter().map(|l| Extension::parse(l.as_ref())).collect(),
        }
    }

    /// Parsed extensions in advertised order.
    #[must_use]
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Returns true if `ext` was advertised exactly.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// STARTTLS advertised.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if 8BITMIME is supported.
    #[must_use]
    pub fn supports_8bitmime(&self) -> bool {
        self.supports(&Extension::EightBitMime)
    }

    /// Checks if CHUNKING (BDAT) is supported.
    #[must_use]
    pub fn supports_chunking(&self) -> bool {
        self.supports(&Extension::Chunking)
    }

    /// Checks if an AUTH mechanism is advertised.
    #[must_use]
    pub fn supports_auth(&self, mechanism: AuthMechanism) -> bool {
        self.auth_mechanisms().contains(&mechanism)
    }

    /// Checks if AUTH LOGIN is advertised.
    #[must_use]
    pub fn supports_auth_login(&self) -> bool {
        self.supports_auth(AuthMechanism::Login)
    }

    /// Size limit from the SIZE keyword.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms, across every AUTH line.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .filter_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod extension_parse_tests {
        use super::*;

        #[test]
        fn parse_starttls() {
            assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
            assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        }

        #[test]
        fn parse_auth_mechanisms() {
            let Extension::Auth(mechs) = Extension::parse("AUTH PLAIN LOGIN XOAUTH2") else {
                panic!("Expected Auth variant");
            };
            assert_eq!(
                mechs,
                vec![AuthMechanism::Plain, AuthMechanism::Login, AuthMechanism::XOAuth2]
            );
        }

        #[test]
        fn parse_auth_skips_unknown_mechanisms() {
            let Extension::Auth(mechs) = Extension::parse("AUTH GSSAPI login") else {
                panic!("Expected Auth variant");
            };
            assert_eq!(mechs, vec![AuthMechanism::Login]);
        }

        #[test]
        fn parse_legacy_auth_form() {
            assert_eq!(
                Extension::parse("AUTH=LOGIN PLAIN"),
                Extension::Auth(vec![AuthMechanism::Login, AuthMechanism::Plain])
            );
        }

        #[test]
        fn parse_size() {
            assert_eq!(Extension::parse("SIZE 52428800"), Extension::Size(Some(52428800)));
            assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        }

        #[test]
        fn parse_keywords() {
            assert_eq!(Extension::parse("8BITMIME"), Extension::EightBitMime);
            assert_eq!(Extension::parse("PIPELINING"), Extension::Pipelining);
            assert_eq!(Extension::parse("CHUNKING"), Extension::Chunking);
            assert_eq!(Extension::parse("SMTPUTF8"), Extension::SmtpUtf8);
            assert_eq!(Extension::parse("DSN"), Extension::Dsn);
            assert_eq!(Extension::parse("BINARYMIME"), Extension::BinaryMime);
        }

        #[test]
        fn parse_unknown() {
            assert_eq!(
                Extension::parse("X-EXPS GSSAPI"),
                Extension::Unknown("X-EXPS GSSAPI".to_string())
            );
            assert_eq!(Extension::parse(""), Extension::Unknown(String::new()));
        }
    }

    mod capabilities_tests {
        use super::*;

        #[test]
        fn from_ehlo_lines() {
            let caps = Capabilities::from_lines(&[
                "PIPELINING",
                "SIZE 10240000",
                "AUTH PLAIN",
                "AUTH=LOGIN",
                "AUTH LOGIN",
                "8BITMIME",
                "CHUNKING",
            ]);

            assert!(caps.supports_8bitmime());
            assert!(caps.supports_chunking());
            assert!(!caps.supports_starttls());
            assert!(caps.supports_auth_login());
            assert!(caps.supports_auth(AuthMechanism::Plain));
            assert_eq!(caps.max_message_size(), Some(10_240_000));
            assert_eq!(caps.extensions().len(), 7);
        }

        #[test]
        fn empty() {
            let caps = Capabilities::from_lines::<String>(&[]);
            assert!(!caps.supports_auth_login());
            assert_eq!(caps.max_message_size(), None);
            assert!(caps.auth_mechanisms().is_empty());
        }
    }
}
