//! Stream types for SMTP connections.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use crate::{Error, Result};

/// A transport that can be secured in place (STARTTLS).
pub trait TlsUpgrade: Sized {
    /// Runs the TLS handshake over the existing transport. The returned
    /// future completes once the handshake has finished.
    fn upgrade_to_tls(self, host: &str) -> impl Future<Output = Result<Self>> + Send;

    /// Returns true if the transport is TLS-encrypted.
    fn is_tls(&self) -> bool;
}

/// A stream that can be either plaintext or TLS.
pub enum SmtpStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl std::fmt::Debug for SmtpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("SmtpStream::Plain"),
            Self::Tls(_) => f.write_str("SmtpStream::Tls"),
        }
    }
}

impl TlsUpgrade for SmtpStream {
    async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let connector = create_tls_connector();
                let server_name = ServerName::try_from(host.to_string())?;
                let tls = connector.connect(server_name, tcp).await.map_err(tls_error)?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::invalid_state("upgrade_to_tls", "stream is already TLS")),
        }
    }

    fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector trusting the webpki root certificates.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Connects to a server with TLS from the start (port 465).
pub async fn connect_tls(host: &str, port: u16) -> Result<SmtpStream> {
    let tcp = TcpStream::connect((host, port)).await?;

    let connector = create_tls_connector();
    let server_name = ServerName::try_from(host.to_string())?;
    let tls = connector.connect(server_name, tcp).await.map_err(tls_error)?;

    Ok(SmtpStream::Tls(Box::new(tls)))
}

/// Connects to a server without TLS (plain SMTP or STARTTLS).
pub async fn connect_plain(host: &str, port: u16) -> Result<SmtpStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    Ok(SmtpStream::Plain(tcp))
}

/// tokio-rustls reports handshake failures as I/O errors wrapping the
/// rustls error.
fn tls_error(err: io::Error) -> Error {
    if let Some(tls) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return Error::Tls(tls.clone());
    }
    Error::Io(err)
}
