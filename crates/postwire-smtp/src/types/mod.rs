//! Core SMTP types.

mod address;
mod extension;
mod reply;

pub use address::{Address, collect_recipients};
pub use extension::{AuthMechanism, Capabilities, Extension};
pub use reply::{MalformedReason, Reply, ReplyCode, Response};
