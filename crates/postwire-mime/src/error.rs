//! Error types for message model operations.

/// Result type alias for message model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message model error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header field name contains characters outside RFC 5322 `ftext`.
    #[error("Invalid header field name: {0:?}")]
    InvalidFieldName(String),

    /// Header field value would break the header framing.
    #[error("Invalid header field value for {name}: {reason}")]
    InvalidFieldValue {
        /// Field name.
        name: String,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// Attachment metadata is unusable.
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),
}
