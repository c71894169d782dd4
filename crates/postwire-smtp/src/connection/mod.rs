//! SMTP connection management: transport, configuration and the command
//! engine.

mod client;
mod config;
mod state;
mod stream;

pub use client::{Greeting, HelloReply, SmtpClient};
pub use config::{
    Config, ConfigBuilder, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, Security,
};
pub use state::{CommandKind, ConnectionState};
pub use stream::{SmtpStream, TlsUpgrade, connect_plain, connect_tls, create_tls_connector};
