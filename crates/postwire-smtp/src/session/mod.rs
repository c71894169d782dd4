//! Multi-step SMTP flows on top of the command engine.
//!
//! [`Session`] sequences greeting, EHLO/HELO negotiation, STARTTLS, AUTH
//! LOGIN and mail transactions. Refusals by the server end an operation
//! with an unsuccessful [`Outcome`]; misuse and transport failures are
//! errors.
//!
//! ## Example
//!
//! ```ignore
//! use postwire_smtp::Session;
//!
//! let mut session = Session::new();
//! let hello = session.connect("smtp.example.com", 587, false, "client.example").await?;
//! if hello.success {
//!     session.starttls().await?;
//!     session.authenticate("user", "secret").await?;
//!     let outcome = session.send("me@example.com", &["you@example.com"], &mail).await?;
//!     session.quit().await?;
//! }
//! ```

mod content;
mod outcome;
mod state;

pub use outcome::{HelloOutcome, Outcome};
pub use state::{AuthStep, SendStep, SessionState};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::connection::{Config, Greeting, SmtpClient, SmtpStream, TlsUpgrade};
use crate::error::{Error, Result};
use crate::message::OutboundMessage;
use crate::types::{Address, AuthMechanism, Capabilities, collect_recipients};
use content::Payload;

/// An SMTP session driving one connection.
#[derive(Debug)]
pub struct Session<S = SmtpStream> {
    client: SmtpClient<S>,
    state: SessionState,
    hello_domain: String,
    host: String,
}

impl<S> Default for Session<S> {
    fn default() -> Self {
        Self::from_client(SmtpClient::new())
    }
}

impl<S> Session<S> {
    /// Creates an unconnected session with default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unconnected session using the timeouts of `config`.
    #[must_use]
    pub fn with_config(config: &Config) -> Self {
        Self::from_client(SmtpClient::with_config(config))
    }

    const fn from_client(client: SmtpClient<S>) -> Self {
        Self {
            client,
            state: SessionState::NotConnected,
            hello_domain: String::new(),
            host: String::new(),
        }
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The underlying command engine.
    #[must_use]
    pub const fn client(&self) -> &SmtpClient<S> {
        &self.client
    }

    /// Returns true once an EHLO has succeeded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while not connected.
    pub fn is_esmtp(&self) -> Result<bool> {
        self.client.is_esmtp()
    }

    /// Extensions from the last successful EHLO.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while not connected.
    pub fn extensions(&self) -> Result<Option<&[String]>> {
        self.client.extensions()
    }

    /// Capabilities parsed from the last successful EHLO. Empty when the
    /// server is not ESMTP.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while not connected.
    pub fn capabilities(&self) -> Result<Capabilities> {
        let lines = self.client.extensions()?.unwrap_or_default();
        Ok(Capabilities::from_lines(lines))
    }

    /// Drops the connection without QUIT and marks the session terminated.
    /// Safe to call in any state and more than once.
    pub fn force_close(&mut self) {
        self.client.force_close();
        if self.state != SessionState::Terminated {
            debug!(from = ?self.state, "session force-closed");
        }
        self.state = SessionState::Terminated;
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(())
    }

    /// Returns to idle after an operation, or to broken if the engine lost
    /// the connection.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        self.state = if self.client.state().is_closed() {
            SessionState::Broken
        } else {
            SessionState::Idle
        };
        result
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Takes over an open transport, reads the greeting and negotiates
    /// EHLO/HELO with `domain`. `host` is kept for a later STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless not connected, or a transport error.
    pub async fn attach(&mut self, stream: S, host: &str, domain: &str) -> Result<HelloOutcome> {
        if self.state != SessionState::NotConnected {
            return Err(Error::invalid_state("attach", self.state));
        }
        self.host = host.to_string();

        let result = match self.client.attach(stream).await {
            Ok(greeting) => self.hello(greeting, domain).await,
            Err(err) => Err(err),
        };
        self.settle(result)
    }

    async fn hello(&mut self, greeting: Greeting, domain: &str) -> Result<HelloOutcome> {
        if !greeting.response.is_success() {
            warn!(response = %greeting.response, "server refused the connection");
            return Ok(HelloOutcome {
                success: false,
                response: greeting.response,
                esmtp: false,
                extensions: None,
            });
        }

        self.hello_domain = domain.to_string();

        let response = if greeting.probable_esmtp {
            let reply = self.client.ehlo(domain).await?;
            if reply.response.is_success() {
                reply.response
            } else {
                debug!(response = %reply.response, "EHLO refused, falling back to HELO");
                self.client.helo(domain).await?.response
            }
        } else {
            self.client.helo(domain).await?.response
        };

        Ok(HelloOutcome {
            success: response.is_success(),
            response,
            esmtp: self.client.is_esmtp()?,
            extensions: self.client.extensions()?.map(<[String]>::to_vec),
        })
    }

    /// Authenticates with AUTH LOGIN.
    ///
    /// The outcome carries the reply that ended the exchange: the final
    /// reply on completion, or the first reply that was not a 3xx challenge.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` for empty
    /// credentials, or a transport error.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<Outcome> {
        self.ensure_idle("authenticate")?;
        if username.is_empty() || password.is_empty() {
            return Err(Error::InvalidArgument(
                "username and password must not be empty".into(),
            ));
        }

        let result = self.auth_login(username, password).await;
        if let Ok(outcome) = &result {
            info!(success = outcome.success, "AUTH LOGIN finished");
        }
        self.settle(result)
    }

    async fn auth_login(&mut self, username: &str, password: &str) -> Result<Outcome> {
        self.state = SessionState::Authenticating(AuthStep::AuthSent);
        let response = self.client.auth(AuthMechanism::Login, None).await?;
        if !response.is_intermediate() {
            return Ok(Outcome::failure(response));
        }

        self.state = SessionState::Authenticating(AuthStep::UsernameSent);
        let response = self.client.auth_response(&STANDARD.encode(username)).await?;
        if !response.is_intermediate() {
            return Ok(Outcome::failure(response));
        }

        self.state = SessionState::Authenticating(AuthStep::PasswordSent);
        let response = self.client.auth_response(&STANDARD.encode(password)).await?;
        Ok(Outcome::from_response(response))
    }

    /// Submits one message.
    ///
    /// Recipients are the addresses found in `recipients` followed by those
    /// found in the message's extra recipients; entries without an address
    /// are skipped. BDAT is used when the server offers CHUNKING, DATA
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` for an empty
    /// sender or when no recipient is left, or a transport error.
    pub async fn send<M: OutboundMessage + ?Sized>(
        &mut self,
        from: &str,
        recipients: &[&str],
        message: &M,
    ) -> Result<Outcome> {
        self.ensure_idle("send")?;
        if from.is_empty() || from.contains(['\r', '\n']) {
            return Err(Error::InvalidArgument(format!("invalid sender {from:?}")));
        }

        let extra = message.extra_recipients();
        let rcpts = collect_recipients(
            recipients
                .iter()
                .copied()
                .chain(extra.iter().map(String::as_str)),
        );
        if rcpts.is_empty() {
            return Err(Error::InvalidArgument("no valid recipient".into()));
        }

        let result = self.transaction(from, &rcpts, message).await;
        if let Ok(outcome) = &result {
            info!(
                success = outcome.success,
                recipients = rcpts.len(),
                response = %outcome.response,
                "send finished"
            );
        }
        self.settle(result)
    }

    async fn transaction<M: OutboundMessage + ?Sized>(
        &mut self,
        from: &str,
        recipients: &[Address],
        message: &M,
    ) -> Result<Outcome> {
        let capabilities = self.capabilities()?;
        let eight_bit = capabilities.supports_8bitmime();
        let chunking = capabilities.supports_chunking();
        debug!(eight_bit, chunking, "starting mail transaction");

        self.state = SessionState::Sending(SendStep::Mail);
        let response = self.client.mail(&format!("<{from}>"), eight_bit).await?;
        if !response.is_success() {
            return Ok(Outcome::failure(response));
        }

        for (index, recipient) in recipients.iter().enumerate() {
            self.state = SessionState::Sending(SendStep::Recipient(index));
            let response = self.client.rcpt(&format!("<{recipient}>")).await?;
            if !response.is_success() {
                debug!(%recipient, "recipient refused");
                return Ok(Outcome::failure(response));
            }
        }

        let payload = Payload::render(message, eight_bit);
        if chunking {
            self.transfer_chunks(&payload).await
        } else {
            self.transfer_data(&payload).await
        }
    }

    async fn transfer_chunks(&mut self, payload: &Payload) -> Result<Outcome> {
        let mut last_response = None;

        for (index, (chunk, last)) in payload.chunks().into_iter().enumerate() {
            self.state = SessionState::Sending(SendStep::Chunk(index));
            let response = self.client.bdat(chunk, last).await?;
            if !response.is_success() {
                return Ok(Outcome::failure(response));
            }
            last_response = Some(response);
        }

        last_response
            .map(Outcome::from_response)
            .ok_or(Error::ConnectionBroken)
    }

    async fn transfer_data(&mut self, payload: &Payload) -> Result<Outcome> {
        self.state = SessionState::Sending(SendStep::Data);
        let response = self.client.data().await?;
        if !response.is_intermediate() {
            return Ok(Outcome::failure(response));
        }

        self.state = SessionState::Sending(SendStep::Content);
        self.client.send_content(&payload.data()).await?;
        let response = self.client.send_content_terminator().await?;
        Ok(Outcome::from_response(response))
    }

    /// Sends QUIT. The session is terminated whatever the reply.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn quit(&mut self) -> Result<Outcome> {
        self.ensure_idle("quit")?;
        let result = self.client.quit().await;
        self.client.force_close();
        self.state = SessionState::Terminated;
        result.map(Outcome::from_response)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + TlsUpgrade> Session<S> {
    /// Sends STARTTLS, secures the transport and repeats EHLO with the
    /// domain used at connect time. The outcome is that of the new EHLO.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport or TLS error.
    pub async fn starttls(&mut self) -> Result<Outcome> {
        self.ensure_idle("starttls")?;
        self.state = SessionState::StartTls;
        let result = self.upgrade().await;
        self.settle(result)
    }

    async fn upgrade(&mut self) -> Result<Outcome> {
        let response = self.client.starttls().await?;
        if !response.is_success() {
            return Ok(Outcome::failure(response));
        }

        self.client.upgrade_to_tls(&self.host).await?;
        info!(host = %self.host, "connection upgraded to TLS");

        let hello = self.client.ehlo(&self.hello_domain).await?;
        Ok(Outcome::from_response(hello.response))
    }
}

impl Session<SmtpStream> {
    /// Connects to `address:port` (TLS from the start when `secure`), reads
    /// the greeting and negotiates EHLO/HELO with `domain`.
    ///
    /// A refused greeting or hello is an unsuccessful outcome; the session is
    /// then idle so it can still be quit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless not connected, or a connection error.
    pub async fn connect(
        &mut self,
        address: &str,
        port: u16,
        secure: bool,
        domain: &str,
    ) -> Result<HelloOutcome> {
        if self.state != SessionState::NotConnected {
            return Err(Error::invalid_state("connect", self.state));
        }
        self.host = address.to_string();

        let result = match self.client.connect(address, port, secure).await {
            Ok(greeting) => self.hello(greeting, domain).await,
            Err(err) => Err(err),
        };
        self.settle(result)
    }
}
