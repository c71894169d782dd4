//! Connection configuration types.

use std::time::Duration;

/// Default time allowed to open the transport and read the greeting.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed for one command's write and reply (RFC 5321
/// section 4.5.3.2 suggests at least five minutes).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption, STARTTLS is never attempted (port 25).
    None,
    /// Start with plaintext, upgrade with STARTTLS when the server offers it
    /// (port 587).
    #[default]
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }

    /// Returns true if the transport is TLS from the first byte.
    #[must_use]
    pub const fn is_implicit(self) -> bool {
        matches!(self, Self::Implicit)
    }
}

/// SMTP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname, also used for TLS server name verification.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Domain announced in EHLO/HELO.
    pub hello_domain: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-command timeout. `None` waits forever.
    pub command_timeout: Option<Duration>,
}

impl Config {
    /// Creates a new configuration with STARTTLS on port 587.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    hello_domain: String,
    connect_timeout: Duration,
    command_timeout: Option<Duration>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::default(),
            hello_domain: "localhost".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the domain announced in EHLO/HELO.
    #[must_use]
    pub fn hello_domain(mut self, domain: impl Into<String>) -> Self {
        self.hello_domain = domain.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command timeout (`None` disables it).
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            hello_domain: self.hello_domain,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 587);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.hello_domain, "localhost");
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.command_timeout, Some(DEFAULT_COMMAND_TIMEOUT));
    }

    #[test]
    fn test_builder_port_follows_security() {
        let config = Config::builder("smtp.example.com")
            .security(Security::Implicit)
            .build();
        assert_eq!(config.port, 465);
        assert!(config.security.is_implicit());
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder("mx.example.com")
            .port(2525)
            .security(Security::None)
            .hello_domain("client.example")
            .connect_timeout(Duration::from_secs(5))
            .command_timeout(None)
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.hello_domain, "client.example");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.command_timeout, None);
    }
}
