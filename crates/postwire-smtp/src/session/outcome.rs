//! Results of session operations.

use crate::types::Response;

/// Result of a multi-step session operation.
///
/// `success` is false when the server refused a step; `response` is the
/// reply that ended the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The operation completed with a positive reply.
    pub success: bool,
    /// The reply that ended the operation.
    pub response: Response,
}

impl Outcome {
    /// Outcome whose success follows the reply's polarity.
    #[must_use]
    pub fn from_response(response: Response) -> Self {
        Self {
            success: response.is_success(),
            response,
        }
    }

    /// Failed outcome ending with `response`.
    #[must_use]
    pub const fn failure(response: Response) -> Self {
        Self {
            success: false,
            response,
        }
    }

    /// Lines of the final reply.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        self.response.lines()
    }
}

/// Result of the greeting and EHLO/HELO negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloOutcome {
    /// Greeting and hello were both positive.
    pub success: bool,
    /// The last reply received (greeting, EHLO or HELO).
    pub response: Response,
    /// EHLO succeeded.
    pub esmtp: bool,
    /// Extensions advertised by EHLO.
    pub extensions: Option<Vec<String>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::types::{MalformedReason, Reply, ReplyCode};

    #[test]
    fn test_from_response_polarity() {
        let ok = Response::Reply(Reply::new(ReplyCode::OK, vec!["250 ok".into()]));
        assert!(Outcome::from_response(ok).success);

        let refused = Response::Reply(Reply::new(
            ReplyCode::MAILBOX_UNAVAILABLE,
            vec!["550 no".into()],
        ));
        let outcome = Outcome::from_response(refused);
        assert!(!outcome.success);
        assert_eq!(outcome.lines(), ["550 no"]);
    }

    #[test]
    fn test_malformed_is_failure() {
        let outcome = Outcome::from_response(Response::Malformed(MalformedReason::InvalidCode));
        assert!(!outcome.success);
        assert!(outcome.lines().is_empty());
    }
}
