//! Submission job file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use postwire_mime::{Attachment, Mail, create_message};
use postwire_smtp::{Config, SendOptions, Security};
use serde::Deserialize;

/// A message to submit and the server to submit it to.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Server settings.
    pub server: Server,
    /// AUTH LOGIN user name.
    #[serde(default)]
    pub username: Option<String>,
    /// AUTH LOGIN password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender, e.g. `Jane <jane@example.com>`.
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon copy recipients.
    #[serde(default)]
    pub cc: Vec<String>,
    /// Blind carbon copy recipients.
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Body text.
    #[serde(default)]
    pub body: String,
    /// Send the body as `text/html`.
    #[serde(default)]
    pub html: bool,
    /// Files to attach.
    #[serde(default)]
    pub attachments: Vec<AttachmentSpec>,
}

/// Server settings of a job.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    /// Host name.
    pub host: String,
    /// Port, defaulting from the security mode.
    #[serde(default)]
    pub port: Option<u16>,
    /// Security mode.
    #[serde(default)]
    pub security: SecurityMode,
    /// Domain announced in EHLO/HELO.
    #[serde(default)]
    pub hello_domain: Option<String>,
    /// Connection timeout in seconds.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Per-command timeout in seconds, 0 disables it.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

/// Security mode as written in the job file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Plaintext only.
    None,
    /// STARTTLS when offered.
    #[default]
    StartTls,
    /// TLS from the start.
    Tls,
}

impl From<SecurityMode> for Security {
    fn from(mode: SecurityMode) -> Self {
        match mode {
            SecurityMode::None => Self::None,
            SecurityMode::StartTls => Self::StartTls,
            SecurityMode::Tls => Self::Implicit,
        }
    }
}

/// A file to attach.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentSpec {
    /// Path of the file.
    pub path: PathBuf,
    /// MIME type, `application/octet-stream` when absent.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// File name shown to the recipient, the path's file name when absent.
    #[serde(default)]
    pub name: Option<String>,
}

/// Default job location: `<config dir>/postwire/job.json`.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("postwire")
        .join("job.json")
}

/// Reads and parses a job file.
pub async fn load(path: &Path) -> Result<Job> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read job file {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid job file {}", path.display()))
}

/// Parses job JSON.
pub fn parse(json: &str) -> Result<Job> {
    Ok(serde_json::from_str(json)?)
}

impl Job {
    /// Connection options for the one-shot send.
    pub fn options(&self) -> SendOptions {
        let server = &self.server;
        let mut builder = Config::builder(&server.host).security(server.security.into());
        if let Some(port) = server.port {
            builder = builder.port(port);
        }
        if let Some(domain) = &server.hello_domain {
            builder = builder.hello_domain(domain);
        }
        if let Some(secs) = server.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = server.command_timeout_secs {
            builder = builder.command_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }

        let options = SendOptions::new(builder.build());
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => options.with_credentials(username, password),
            _ => options,
        }
    }

    /// Builds the message, reading attachments from disk.
    pub async fn message(&self) -> Result<Mail> {
        let to: Vec<&str> = self.to.iter().map(String::as_str).collect();
        let mut mail = create_message(&self.from, &to, &self.subject, &self.body)?;

        for cc in &self.cc {
            mail.add_field("Cc", cc.as_str())?;
        }
        for bcc in &self.bcc {
            mail.add_field("Bcc", bcc.as_str())?;
        }
        if self.html {
            mail.set_body_type_to_html();
        }

        for spec in &self.attachments {
            let data = tokio::fs::read(&spec.path)
                .await
                .with_context(|| format!("cannot read attachment {}", spec.path.display()))?;
            let name = spec.name.clone().unwrap_or_else(|| {
                spec.path
                    .file_name()
                    .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned())
            });
            let mime_type = spec
                .mime_type
                .as_deref()
                .unwrap_or("application/octet-stream");
            mail.add_attachment(Attachment::new(data, name, mime_type)?);
        }

        Ok(mail)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "server": { "host": "smtp.example.com" },
        "from": "a@example.com",
        "to": ["b@example.com"]
    }"#;

    #[test]
    fn test_minimal_job_defaults() {
        let job = parse(MINIMAL).unwrap();
        let options = job.options();

        assert_eq!(options.config.port, 587);
        assert_eq!(options.config.security, Security::StartTls);
        assert!(options.credentials.is_none());
        assert!(job.attachments.is_empty());
    }

    #[test]
    fn test_full_server_settings() {
        let job = parse(
            r#"{
                "server": {
                    "host": "mx.example.com",
                    "port": 2525,
                    "security": "tls",
                    "hello_domain": "client.example",
                    "command_timeout_secs": 0
                },
                "username": "user",
                "password": "secret",
                "from": "a@example.com",
                "to": ["b@example.com"]
            }"#,
        )
        .unwrap();
        let options = job.options();

        assert_eq!(options.config.port, 2525);
        assert_eq!(options.config.security, Security::Implicit);
        assert_eq!(options.config.hello_domain, "client.example");
        assert_eq!(options.config.command_timeout, None);
        assert_eq!(options.credentials.unwrap().username, "user");
    }

    #[test]
    fn test_unknown_security_rejected() {
        let json = MINIMAL.replace(
            r#""host": "smtp.example.com""#,
            r#""host": "smtp.example.com", "security": "ssl""#,
        );
        assert!(parse(&json).is_err());
    }

    #[tokio::test]
    async fn test_message_fields() {
        let mut job = parse(MINIMAL).unwrap();
        job.cc = vec!["c@example.com".into()];
        job.html = true;
        job.body = "<p>hi</p>".into();

        let mail = job.message().await.unwrap();
        assert_eq!(mail.field_values("Cc"), ["c@example.com"]);
        assert_eq!(mail.body_type(), "text/html");
        assert_eq!(mail.body(), ["<p>hi</p>"]);
    }
}
