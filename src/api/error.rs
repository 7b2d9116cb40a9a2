//! Error taxonomy for DevRev API interactions.

use std::fmt;

use crate::resilience::CircuitOpenError;

/// A failed API interaction, categorized by how the pipeline should react.
///
/// Only `RateLimited` is retryable; `Auth` is fatal for the whole run;
/// `NotFound` and `Forbidden` mark the affected record as a failed update
/// without stopping anything else.
#[derive(Debug)]
pub enum ApiError {
    /// HTTP 429 from the platform.
    RateLimited(String),
    /// HTTP 401. The credential is bad; no further call can succeed.
    Auth(String),
    /// HTTP 404 for the target record.
    NotFound(String),
    /// HTTP 403.
    Forbidden(String),
    /// Any other non-success HTTP status.
    Http {
        /// The response status code.
        status: u16,
        /// The response body, or the platform's error message when one
        /// could be extracted.
        body: String,
    },
    /// The request never produced a response (connect, timeout, decode).
    Transport(String),
    /// Rejected locally by the open circuit breaker.
    CircuitOpen,
}

impl ApiError {
    /// Whether the retry policy should try this call again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Whether this error invalidates the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(msg) => write!(f, "rate limited by the platform: {msg}"),
            Self::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Self::NotFound(msg) => write!(f, "record not found: {msg}"),
            Self::Forbidden(msg) => write!(f, "permission denied: {msg}"),
            Self::Http { status, body } => write!(f, "API error (status {status}): {body}"),
            Self::Transport(msg) => write!(f, "request failed: {msg}"),
            Self::CircuitOpen => fmt::Display::fmt(&CircuitOpenError, f),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<CircuitOpenError> for ApiError {
    fn from(_: CircuitOpenError) -> Self {
        Self::CircuitOpen
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;

    #[test]
    fn only_rate_limits_are_retryable() {
        assert!(ApiError::RateLimited("slow down".to_string()).is_retryable());
        assert!(!ApiError::Auth("bad token".to_string()).is_retryable());
        assert!(!ApiError::NotFound("gone".to_string()).is_retryable());
        assert!(!ApiError::Forbidden("nope".to_string()).is_retryable());
        assert!(!ApiError::Http { status: 500, body: "oops".to_string() }.is_retryable());
        assert!(!ApiError::Transport("connection reset".to_string()).is_retryable());
        assert!(!ApiError::CircuitOpen.is_retryable());
    }

    #[test]
    fn only_auth_errors_are_fatal() {
        assert!(ApiError::Auth("bad token".to_string()).is_fatal());
        assert!(!ApiError::RateLimited("slow down".to_string()).is_fatal());
        assert!(!ApiError::Http { status: 500, body: "oops".to_string() }.is_fatal());
    }

    #[test]
    fn display_includes_the_status_code() {
        let err = ApiError::Http { status: 503, body: "unavailable".to_string() };
        assert_eq!(err.to_string(), "API error (status 503): unavailable");
    }
}
