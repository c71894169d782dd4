//! One-shot submission: connect, secure, authenticate, send and quit.

use std::fmt;

use postwire_mime::Mail;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::connection::{Config, Security, TlsUpgrade};
use crate::error::{Error, Result};
use crate::session::{HelloOutcome, Outcome, Session};
use crate::types::{Address, Response};

/// Where a one-shot send stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The message was accepted and QUIT was acknowledged.
    Done,
    /// The greeting or EHLO/HELO was refused.
    FailedToConnect,
    /// STARTTLS or the EHLO after it was refused.
    FailedStartTls,
    /// The server rejected the credentials.
    FailedToAuthenticate,
    /// Credentials were given but the server does not offer AUTH LOGIN.
    UnableToAuthenticate,
    /// MAIL, RCPT, DATA or BDAT was refused.
    FailedToSend,
    /// The message was accepted but QUIT failed.
    QuitErroneous,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Done => "done",
            Self::FailedToConnect => "failed to connect",
            Self::FailedStartTls => "failed STARTTLS",
            Self::FailedToAuthenticate => "failed to authenticate",
            Self::UnableToAuthenticate => "unable to authenticate",
            Self::FailedToSend => "failed to send",
            Self::QuitErroneous => "quit erroneous",
        };
        f.write_str(text)
    }
}

/// AUTH LOGIN credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Options for [`send`].
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Server and connection settings.
    pub config: Config,
    /// Credentials for AUTH LOGIN, if the server requires them.
    pub credentials: Option<Credentials>,
}

impl SendOptions {
    /// Options without credentials.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            credentials: None,
        }
    }

    /// Adds AUTH LOGIN credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }
}

/// Result of a one-shot send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendStatus {
    /// Where the exchange stopped.
    pub action: Action,
    /// The message was accepted by the server.
    pub is_ok: bool,
    /// Lines of the last reply.
    pub lines: Vec<String>,
    /// Code of the last reply, if it was well-formed.
    pub code: Option<u16>,
}

impl SendStatus {
    fn new(action: Action, is_ok: bool, response: &Response) -> Self {
        Self {
            action,
            is_ok,
            lines: response.lines().to_vec(),
            code: response.code().map(|code| code.as_u16()),
        }
    }

    fn failed(action: Action, response: &Response) -> Self {
        Self::new(action, false, response)
    }
}

/// Connects to the configured server and submits `message`.
///
/// The sender is the first address in the message's `From` field; the
/// recipients are its `To`, `Cc` and `Bcc` values. With
/// [`Security::StartTls`] the connection is upgraded when the server offers
/// STARTTLS. The connection is always closed before returning.
///
/// Server refusals are reported through [`SendStatus`]. A failure of QUIT
/// after the message was accepted still counts as sent.
///
/// # Errors
///
/// Returns `InvalidArgument` if the message has no usable `From` or
/// recipient, or a connection or transport error.
pub async fn send(options: &SendOptions, message: &Mail) -> Result<SendStatus> {
    let config = &options.config;
    let mut session = Session::with_config(config);

    let result = match session
        .connect(
            &config.host,
            config.port,
            config.security.is_implicit(),
            &config.hello_domain,
        )
        .await
    {
        Ok(hello) => deliver(&mut session, hello, options, message).await,
        Err(err) => Err(err),
    };

    session.force_close();
    log_status(&result);
    result
}

/// Same as [`send`] over an already open transport.
///
/// # Errors
///
/// See [`send`].
pub async fn send_over<S>(stream: S, options: &SendOptions, message: &Mail) -> Result<SendStatus>
where
    S: AsyncRead + AsyncWrite + Unpin + TlsUpgrade,
{
    let config = &options.config;
    let mut session = Session::with_config(config);

    let result = match session
        .attach(stream, &config.host, &config.hello_domain)
        .await
    {
        Ok(hello) => deliver(&mut session, hello, options, message).await,
        Err(err) => Err(err),
    };

    session.force_close();
    log_status(&result);
    result
}

async fn deliver<S>(
    session: &mut Session<S>,
    hello: HelloOutcome,
    options: &SendOptions,
    message: &Mail,
) -> Result<SendStatus>
where
    S: AsyncRead + AsyncWrite + Unpin + TlsUpgrade,
{
    if !hello.success {
        return Ok(SendStatus::failed(Action::FailedToConnect, &hello.response));
    }
    let mut last = hello.response;

    let from = message
        .field("From")
        .and_then(Address::find)
        .ok_or_else(|| Error::InvalidArgument("message has no From address".into()))?;
    let to = message.field_values("To");

    let mut capabilities = session.capabilities()?;
    if options.config.security == Security::StartTls && capabilities.supports_starttls() {
        let outcome = session.starttls().await?;
        if !outcome.success {
            return Ok(SendStatus::failed(Action::FailedStartTls, &outcome.response));
        }
        capabilities = session.capabilities()?;
        last = outcome.response;
    }

    if let Some(credentials) = &options.credentials {
        if session.is_esmtp()? && !capabilities.supports_auth_login() {
            debug!(mechanisms = ?capabilities.auth_mechanisms(), "AUTH LOGIN not offered");
            return Ok(SendStatus::failed(Action::UnableToAuthenticate, &last));
        }

        let outcome = session
            .authenticate(&credentials.username, &credentials.password)
            .await?;
        if !outcome.success {
            return Ok(SendStatus::failed(
                Action::FailedToAuthenticate,
                &outcome.response,
            ));
        }
    }

    let sent = session.send(from.as_str(), &to, message).await?;
    if !sent.success {
        return Ok(SendStatus::failed(Action::FailedToSend, &sent.response));
    }

    Ok(quit(session, &sent).await)
}

async fn quit<S>(session: &mut Session<S>, sent: &Outcome) -> SendStatus
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match session.quit().await {
        Ok(outcome) if outcome.success => SendStatus::new(Action::Done, true, &outcome.response),
        Ok(outcome) => SendStatus::new(Action::QuitErroneous, true, &outcome.response),
        Err(err) => {
            warn!(error = %err, "QUIT failed after the message was accepted");
            SendStatus::new(Action::QuitErroneous, true, &sent.response)
        }
    }
}

fn log_status(result: &Result<SendStatus>) {
    match result {
        Ok(status) => info!(
            action = %status.action,
            is_ok = status.is_ok,
            code = ?status.code,
            "one-shot send finished"
        ),
        Err(err) => warn!(error = %err, "one-shot send failed"),
    }
}
