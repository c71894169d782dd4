//! SMTP command engine.
//!
//! [`SmtpClient`] owns the transport and enforces strict half-duplex
//! sequencing: one command is written, its reply is read to completion, and
//! only then may the next command be issued. Server replies, positive or
//! negative, are returned as [`Response`] values. Only misuse of the API and
//! transport failures are errors.

use std::future::{Future, poll_fn};
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, trace, warn};

use super::config::{Config, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};
use super::state::{CommandKind, ConnectionState};
use super::stream::{SmtpStream, TlsUpgrade, connect_plain, connect_tls};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{Feed, ThreeDigitReply};
use crate::types::{AuthMechanism, Response};

const READ_BUFFER_SIZE: usize = 4096;

/// Server greeting read after the transport is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// The greeting reply.
    pub response: Response,
    /// The first greeting line mentions `ESMTP`.
    pub probable_esmtp: bool,
}

/// Reply to HELO or EHLO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloReply {
    /// The reply.
    pub response: Response,
    /// Domain the server announced on the first line, if any.
    pub domain: Option<String>,
}

/// SMTP command engine over any async byte stream.
#[derive(Debug)]
pub struct SmtpClient<S = SmtpStream> {
    stream: Option<S>,
    state: ConnectionState,
    buffer: BytesMut,
    extensions: Option<Vec<String>>,
    connect_timeout: Duration,
    command_timeout: Option<Duration>,
}

impl<S> Default for SmtpClient<S> {
    fn default() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, Some(DEFAULT_COMMAND_TIMEOUT))
    }
}

impl<S> SmtpClient<S> {
    /// Creates an unconnected client with default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unconnected client using the timeouts of `config`.
    #[must_use]
    pub fn with_config(config: &Config) -> Self {
        Self::with_timeouts(config.connect_timeout, config.command_timeout)
    }

    /// Creates an unconnected client with explicit timeouts.
    #[must_use]
    pub fn with_timeouts(connect_timeout: Duration, command_timeout: Option<Duration>) -> Self {
        Self {
            stream: None,
            state: ConnectionState::NotConnected,
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
            extensions: None,
            connect_timeout,
            command_timeout,
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Extension lines from the last successful EHLO, code prefix removed.
    /// `None` if no EHLO succeeded on this connection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while not connected.
    pub fn extensions(&self) -> Result<Option<&[String]>> {
        self.ensure_connected("extensions")?;
        Ok(self.extensions.as_deref())
    }

    /// Returns true once an EHLO has succeeded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` while not connected.
    pub fn is_esmtp(&self) -> Result<bool> {
        self.ensure_connected("is_esmtp")?;
        Ok(self.extensions.is_some())
    }

    /// Drops the transport without sending QUIT. Safe to call repeatedly.
    pub fn force_close(&mut self) {
        if self.stream.take().is_some() {
            debug!(state = ?self.state, "connection force-closed");
        }
        if self.state != ConnectionState::Terminated {
            self.state = ConnectionState::Broken;
        }
    }

    fn ensure_connected(&self, operation: &'static str) -> Result<()> {
        if self.state == ConnectionState::NotConnected {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(())
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        if self.state != ConnectionState::Idle {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(())
    }

    fn mark_broken(&mut self) {
        if self.state != ConnectionState::Terminated {
            debug!(from = ?self.state, "connection broken");
            self.state = ConnectionState::Broken;
        }
        self.stream = None;
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpClient<S> {
    /// Takes over an already open transport and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless not connected, or a transport error.
    pub async fn attach(&mut self, stream: S) -> Result<Greeting> {
        if self.state != ConnectionState::NotConnected {
            return Err(Error::invalid_state("attach", self.state));
        }
        self.state = ConnectionState::Connecting;
        self.start(stream).await
    }

    async fn start(&mut self, stream: S) -> Result<Greeting> {
        self.stream = Some(stream);
        self.extensions = None;
        self.state = ConnectionState::AwaitingReply(CommandKind::Greeting);

        let deadline = self.deadline();
        let response = self.read_response(deadline).await?;
        self.finish(CommandKind::Greeting, &response).await;

        let probable_esmtp = response
            .lines()
            .first()
            .is_some_and(|line| line.contains("ESMTP"));
        Ok(Greeting {
            response,
            probable_esmtp,
        })
    }

    /// Sends HELO.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` if `domain`
    /// contains a line break, or a transport error.
    pub async fn helo(&mut self, domain: &str) -> Result<HelloReply> {
        let response = self
            .execute(Command::Helo {
                domain: domain.to_string(),
            })
            .await?;
        Ok(HelloReply {
            domain: announced_domain(&response),
            response,
        })
    }

    /// Sends EHLO. A positive reply replaces the extension list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` if `domain`
    /// contains a line break, or a transport error.
    pub async fn ehlo(&mut self, domain: &str) -> Result<HelloReply> {
        let response = self
            .execute(Command::Ehlo {
                domain: domain.to_string(),
            })
            .await?;

        if let Some(reply) = response.reply().filter(|reply| reply.is_success()) {
            let extensions: Vec<String> = reply.text_lines().skip(1).map(str::to_string).collect();
            debug!(?extensions, "ESMTP extensions");
            self.extensions = Some(extensions);
        }

        Ok(HelloReply {
            domain: announced_domain(&response),
            response,
        })
    }

    /// Sends `MAIL FROM:<reverse-path>`, adding `BODY=8BITMIME` if asked.
    ///
    /// `from` is sent verbatim, angle brackets included.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` for an empty or
    /// multi-line sender, or a transport error.
    pub async fn mail(&mut self, from: &str, eight_bit_mime: bool) -> Result<Response> {
        self.execute(Command::MailFrom {
            from: from.to_string(),
            eight_bit_mime,
        })
        .await
    }

    /// Sends `RCPT TO:<forward-path>`. `to` is sent verbatim.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` for an empty or
    /// multi-line recipient, or a transport error.
    pub async fn rcpt(&mut self, to: &str) -> Result<Response> {
        self.execute(Command::RcptTo { to: to.to_string() }).await
    }

    /// Sends DATA. A 354 reply means content may follow.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn data(&mut self) -> Result<Response> {
        self.execute(Command::Data).await
    }

    /// Writes message content as is. No reply is read.
    ///
    /// The caller is responsible for CRLF line endings and dot-stuffing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn send_content(&mut self, content: &[u8]) -> Result<()> {
        self.ensure_idle("content")?;
        self.check_unsolicited().await?;
        trace!(bytes = content.len(), "C: <content>");
        let deadline = self.deadline();
        self.write(&[content], deadline).await
    }

    /// Writes the `.` line that ends DATA content and reads the reply.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn send_content_terminator(&mut self) -> Result<Response> {
        self.execute(Command::EndOfData).await
    }

    /// Sends one BDAT chunk: the `BDAT <size>[ LAST]` header followed by the
    /// raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn bdat(&mut self, chunk: &[u8], last: bool) -> Result<Response> {
        let command = Command::Bdat {
            size: chunk.len(),
            last,
        };
        self.ensure_idle(command.kind().verb())?;
        self.dispatch(&command, chunk).await
    }

    /// Sends NOOP with an optional argument.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn noop(&mut self, argument: Option<&str>) -> Result<Response> {
        self.execute(Command::Noop {
            argument: argument.map(str::to_string),
        })
        .await
    }

    /// Sends RSET.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn rset(&mut self) -> Result<Response> {
        self.execute(Command::Rset).await
    }

    /// Sends QUIT. Whatever the reply, the connection ends up terminated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn quit(&mut self) -> Result<Response> {
        self.execute(Command::Quit).await
    }

    /// Sends VRFY.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` for an empty
    /// argument, or a transport error.
    pub async fn vrfy(&mut self, user: &str) -> Result<Response> {
        self.execute(Command::Vrfy {
            user: user.to_string(),
        })
        .await
    }

    /// Sends EXPN.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` for an empty
    /// argument, or a transport error.
    pub async fn expn(&mut self, list: &str) -> Result<Response> {
        self.execute(Command::Expn {
            list: list.to_string(),
        })
        .await
    }

    /// Sends HELP with an optional topic.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn help(&mut self, topic: Option<&str>) -> Result<Response> {
        self.execute(Command::Help {
            topic: topic.map(str::to_string),
        })
        .await
    }

    /// Sends STARTTLS. Securing the transport is a separate step, see
    /// [`upgrade_to_tls`](Self::upgrade_to_tls).
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn starttls(&mut self) -> Result<Response> {
        self.execute(Command::StartTls).await
    }

    /// Sends `AUTH <mechanism> [initial-response]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn auth(
        &mut self,
        mechanism: AuthMechanism,
        initial_response: Option<&str>,
    ) -> Result<Response> {
        self.execute(Command::Auth {
            mechanism,
            initial_response: initial_response.map(str::to_string),
        })
        .await
    }

    /// Answers an AUTH challenge. The line is masked in logs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or a transport error.
    pub async fn auth_response(&mut self, response: &str) -> Result<Response> {
        self.execute(Command::AuthResponse(response.to_string())).await
    }

    /// Sends an arbitrary command line (CRLF is appended).
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, `InvalidArgument` for an empty or
    /// multi-line command, or a transport error.
    pub async fn raw_command(&mut self, line: &str) -> Result<Response> {
        self.execute(Command::Raw(line.to_string())).await
    }

    async fn execute(&mut self, command: Command) -> Result<Response> {
        self.ensure_idle(command.kind().verb())?;
        command.validate()?;
        self.dispatch(&command, &[]).await
    }

    async fn dispatch(&mut self, command: &Command, payload: &[u8]) -> Result<Response> {
        self.check_unsolicited().await?;

        let kind = command.kind();
        self.state = ConnectionState::AwaitingReply(kind);
        trace!(?command, "C:");
        let deadline = self.deadline();
        self.write(&[&command.serialize(), payload], deadline).await?;

        let response = self.read_response(deadline).await?;
        self.finish(kind, &response).await;
        Ok(response)
    }

    async fn finish(&mut self, kind: CommandKind, response: &Response) {
        match response {
            Response::Reply(reply) => {
                debug!(command = kind.verb(), code = %reply.code, lines = reply.lines.len(), "S: reply");
                for line in &reply.lines {
                    trace!("S: {line}");
                }
            }
            Response::Malformed(reason) => {
                warn!(command = kind.verb(), %reason, "S: malformed reply");
            }
        }

        if kind == CommandKind::Quit {
            self.state = ConnectionState::Terminated;
            if let Some(mut stream) = self.stream.take() {
                let _ = with_deadline(self.command_timeout, stream.shutdown()).await;
            }
            debug!("connection terminated");
        } else {
            self.state = ConnectionState::Idle;
        }
    }

    /// Detects bytes or EOF that arrived while no command was outstanding.
    async fn check_unsolicited(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionBroken)?;
        let mut scratch = [0u8; 512];

        let polled = poll_fn(|cx| {
            let mut buf = ReadBuf::new(&mut scratch);
            match Pin::new(&mut *stream).poll_read(cx, &mut buf) {
                Poll::Pending => Poll::Ready(Ok(None)),
                Poll::Ready(Ok(())) => Poll::Ready(Ok(Some(buf.filled().len()))),
                Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            }
        })
        .await;

        match polled {
            Ok(None) => Ok(()),
            Ok(Some(0)) => {
                warn!("connection closed by server");
                self.mark_broken();
                Err(Error::ConnectionBroken)
            }
            Ok(Some(n)) => {
                warn!(bytes = n, "unsolicited data from server");
                Err(Error::NotExpectingData(n))
            }
            Err(err) => {
                self.mark_broken();
                Err(err.into())
            }
        }
    }

    /// One deadline spans the write and every read of an exchange.
    fn deadline(&self) -> Option<Deadline> {
        self.command_timeout.map(|limit| Deadline {
            at: Instant::now() + limit,
            limit,
        })
    }

    async fn write(&mut self, parts: &[&[u8]], deadline: Option<Deadline>) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionBroken)?;
        let writing = async {
            for part in parts.iter().filter(|part| !part.is_empty()) {
                stream.write_all(part).await?;
            }
            stream.flush().await
        };

        let result = before(deadline, writing).await;
        if result.is_err() {
            self.mark_broken();
        }
        result
    }

    async fn read_response(&mut self, deadline: Option<Deadline>) -> Result<Response> {
        let mut parser = ThreeDigitReply::new();

        let response = loop {
            let stream = self.stream.as_mut().ok_or(Error::ConnectionBroken)?;
            self.buffer.clear();

            let read = before(deadline, stream.read_buf(&mut self.buffer)).await;
            let n = match read {
                Ok(n) => n,
                Err(err) => {
                    if matches!(err, Error::Timeout(_)) {
                        warn!("no reply before deadline");
                    }
                    self.mark_broken();
                    return Err(err);
                }
            };

            if n == 0 {
                warn!(state = ?self.state, "connection closed while awaiting reply");
                self.mark_broken();
                return Err(Error::ConnectionBroken);
            }

            if parser.feed(&self.buffer) != Feed::InProgress {
                break parser.into_response();
            }
        };

        response.ok_or(Error::ConnectionBroken)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + TlsUpgrade> SmtpClient<S> {
    /// Runs the TLS handshake on the open transport. Used after a positive
    /// STARTTLS reply.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless idle, or the handshake error (the
    /// connection is then broken).
    pub async fn upgrade_to_tls(&mut self, host: &str) -> Result<()> {
        self.ensure_idle("upgrade_to_tls")?;
        let stream = self.stream.take().ok_or(Error::ConnectionBroken)?;
        self.state = ConnectionState::Handshaking;

        match with_deadline(self.command_timeout, stream.upgrade_to_tls(host)).await {
            Ok(stream) => {
                debug!(host, "TLS established");
                self.stream = Some(stream);
                self.state = ConnectionState::Idle;
                Ok(())
            }
            Err(err) => {
                warn!(host, error = %err, "TLS handshake failed");
                self.mark_broken();
                Err(err)
            }
        }
    }

    /// Returns true if the transport is TLS-encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.stream.as_ref().is_some_and(TlsUpgrade::is_tls)
    }
}

impl SmtpClient<SmtpStream> {
    /// Opens a TCP connection (TLS from the start when `secure`) and reads
    /// the greeting.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless not connected, `InvalidArgument` for an
    /// empty address, or a connection error.
    pub async fn connect(&mut self, address: &str, port: u16, secure: bool) -> Result<Greeting> {
        if self.state != ConnectionState::NotConnected {
            return Err(Error::invalid_state("connect", self.state));
        }
        if address.is_empty() {
            return Err(Error::InvalidArgument("address must not be empty".into()));
        }

        self.state = ConnectionState::Connecting;
        debug!(address, port, secure, "connecting");

        let opening = async {
            if secure {
                connect_tls(address, port).await
            } else {
                connect_plain(address, port).await
            }
        };

        match with_deadline(Some(self.connect_timeout), opening).await {
            Ok(stream) => self.start(stream).await,
            Err(err) => {
                warn!(address, port, error = %err, "connection failed");
                self.state = ConnectionState::Broken;
                Err(err)
            }
        }
    }
}

/// Domain on the first line of a positive reply: the text between the code
/// and the first following space. A line without that space names none.
fn announced_domain(response: &Response) -> Option<String> {
    let reply = response.reply().filter(|reply| reply.is_success())?;
    let (domain, _) = reply.text_lines().next()?.split_once(' ')?;
    (!domain.is_empty()).then(|| domain.to_string())
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

async fn before<T, E, F>(deadline: Option<Deadline>, future: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    match deadline {
        Some(deadline) => match timeout_at(deadline.at, future).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Error::Timeout(deadline.limit)),
        },
        None => future.await.map_err(Into::into),
    }
}

async fn with_deadline<T, E, F>(limit: Option<Duration>, future: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    match limit {
        Some(limit) => match timeout(limit, future).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(Error::Timeout(limit)),
        },
        None => future.await.map_err(Into::into),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::types::MalformedReason;
    use tokio_test::io::{Builder, Mock};

    async fn attached(mock: Mock) -> (SmtpClient<Mock>, Greeting) {
        let mut client = SmtpClient::new();
        let greeting = client.attach(mock).await.unwrap();
        (client, greeting)
    }

    #[tokio::test]
    async fn test_greeting_probable_esmtp() {
        let mock = Builder::new()
            .read(b"220 mail.example.com ESMTP ready\r\n")
            .build();
        let (client, greeting) = attached(mock).await;

        assert!(greeting.probable_esmtp);
        assert!(greeting.response.is_success());
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(!client.is_esmtp().unwrap());
    }

    #[tokio::test]
    async fn test_greeting_without_esmtp() {
        let mock = Builder::new().read(b"220 mail.example.com SMTP\r\n").build();
        let (_, greeting) = attached(mock).await;
        assert!(!greeting.probable_esmtp);
    }

    #[tokio::test]
    async fn test_greeting_in_pieces() {
        let mock = Builder::new()
            .read(b"22")
            .read(b"0-first\r")
            .read(b"\n220 ESMTP second\r\n")
            .build();
        let (_, greeting) = attached(mock).await;

        assert_eq!(greeting.response.lines(), ["220-first", "220 ESMTP second"]);
        // Only the first line counts.
        assert!(!greeting.probable_esmtp);
    }

    #[tokio::test]
    async fn test_ehlo_collects_extensions() {
        let mock = Builder::new()
            .read(b"220 mail.example.com ESMTP\r\n")
            .write(b"EHLO client.example\r\n")
            .read(b"250-mail.example.com greets you\r\n250-8BITMIME\r\n250 CHUNKING\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        let hello = client.ehlo("client.example").await.unwrap();
        assert!(hello.response.is_success());
        assert_eq!(hello.domain.as_deref(), Some("mail.example.com"));
        assert_eq!(
            client.extensions().unwrap().unwrap(),
            ["8BITMIME", "CHUNKING"]
        );
        assert!(client.is_esmtp().unwrap());
    }

    #[tokio::test]
    async fn test_failed_ehlo_keeps_previous_extensions() {
        let mock = Builder::new()
            .read(b"220 ESMTP\r\n")
            .write(b"EHLO a\r\n")
            .read(b"250-srv\r\n250 PIPELINING\r\n")
            .write(b"EHLO b\r\n")
            .read(b"502 no\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        client.ehlo("a").await.unwrap();
        let hello = client.ehlo("b").await.unwrap();
        assert!(!hello.response.is_success());
        assert_eq!(client.extensions().unwrap().unwrap(), ["PIPELINING"]);
    }

    #[tokio::test]
    async fn test_helo_domain_and_empty_argument() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"HELO\r\n")
            .read(b"250 \r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        let hello = client.helo("").await.unwrap();
        assert!(hello.response.is_success());
        assert_eq!(hello.domain, None);
        assert_eq!(client.extensions().unwrap(), None);
    }

    #[tokio::test]
    async fn test_mail_rcpt_data_content() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"MAIL FROM:<a@example.com> BODY=8BITMIME\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<b@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: x\r\n\r\nbody\r\n")
            .write(b".\r\n")
            .read(b"250 queued\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        assert!(client.mail("<a@example.com>", true).await.unwrap().is_success());
        assert!(client.rcpt("<b@example.com>").await.unwrap().is_success());
        assert!(client.data().await.unwrap().is_intermediate());
        client.send_content(b"Subject: x\r\n\r\nbody\r\n").await.unwrap();
        let done = client.send_content_terminator().await.unwrap();
        assert_eq!(done.lines(), ["250 queued"]);
    }

    #[tokio::test]
    async fn test_bdat_writes_header_and_chunk() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"BDAT 5 LAST\r\nhello")
            .read(b"250 ok\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        assert!(client.bdat(b"hello", true).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_optional_argument_verbs() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"NOOP\r\n")
            .read(b"250 ok\r\n")
            .write(b"HELP MAIL\r\n")
            .read(b"214 see RFC 5321\r\n")
            .write(b"VRFY postmaster\r\n")
            .read(b"252 cannot verify\r\n")
            .write(b"EXPN staff\r\n")
            .read(b"502 no\r\n")
            .write(b"RSET\r\n")
            .read(b"250 ok\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        assert!(client.noop(None).await.unwrap().is_success());
        assert_eq!(client.help(Some("MAIL")).await.unwrap().code().unwrap().as_u16(), 214);
        assert!(client.vrfy("postmaster").await.unwrap().is_success());
        assert!(!client.expn("staff").await.unwrap().is_success());
        assert!(client.rset().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_negative_reply_is_not_an_error() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"RCPT TO:<x@example.com>\r\n")
            .read(b"550 No such user\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        let response = client.rcpt("<x@example.com>").await.unwrap();
        assert!(response.reply().unwrap().is_permanent_error());
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_malformed_reply_returns_to_idle() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"NOOP\r\n")
            .read(b"what?\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        let response = client.noop(None).await.unwrap();
        assert_eq!(response, Response::Malformed(MalformedReason::InvalidCode));
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_quit_negative_still_terminates() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"QUIT\r\n")
            .read(b"500 what\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        let response = client.quit().await.unwrap();
        assert!(!response.is_success());
        assert_eq!(client.state(), ConnectionState::Terminated);

        let err = client.noop(None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_eof_while_awaiting_reply_breaks() {
        let mock = Builder::new()
            .read(b"220 hi\r\n")
            .write(b"NOOP\r\n")
            .build();
        let (mut client, _) = attached(mock).await;

        let err = client.noop(None).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionBroken));
        assert_eq!(client.state(), ConnectionState::Broken);
    }

    #[tokio::test]
    async fn test_invalid_argument() {
        let mock = Builder::new().read(b"220 hi\r\n").build();
        let (mut client, _) = attached(mock).await;

        let err = client.rcpt("<a@b.com>\r\nRSET").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        let err = client.vrfy("").await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut client: SmtpClient<Mock> = SmtpClient::new();

        assert!(matches!(client.noop(None).await, Err(Error::InvalidState { .. })));
        assert!(matches!(client.extensions(), Err(Error::InvalidState { .. })));
        assert!(matches!(client.is_esmtp(), Err(Error::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_attach_twice() {
        let mock = Builder::new().read(b"220 hi\r\n").build();
        let (mut client, _) = attached(mock).await;

        let other = Builder::new().build();
        let err = client.attach(other).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_force_close_is_idempotent() {
        let mock = Builder::new().read(b"220 hi\r\n").build();
        let (mut client, _) = attached(mock).await;

        client.force_close();
        assert_eq!(client.state(), ConnectionState::Broken);
        client.force_close();
        assert_eq!(client.state(), ConnectionState::Broken);
    }

    #[test]
    fn test_announced_domain() {
        use crate::types::{Reply, ReplyCode};

        let response = Response::Reply(Reply::new(
            ReplyCode::OK,
            vec!["250-mx.example.org Hello".into(), "250 SIZE".into()],
        ));
        assert_eq!(announced_domain(&response).as_deref(), Some("mx.example.org"));

        let response = Response::Reply(Reply::new(ReplyCode::OK, vec!["250 mx".into()]));
        assert_eq!(announced_domain(&response), None);

        let response = Response::Reply(Reply::new(
            ReplyCode::new(550),
            vec!["550 mx.example.org denied".into()],
        ));
        assert_eq!(announced_domain(&response), None);

        let response = Response::Malformed(MalformedReason::NoData);
        assert_eq!(announced_domain(&response), None);
    }
}
