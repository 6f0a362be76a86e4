//! Error types for ctxstream-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using ctxstream-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Hint appended to bad-request failures, which are usually oversized payloads.
pub const BAD_REQUEST_HINT: &str =
    "the request may be too large; try streaming mode or reduce the selected context";

/// Errors that can occur while planning or delivering context.
#[derive(Error, Debug)]
pub enum Error {
    /// The endpoint rejected the credential
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The endpoint is rate limiting; the caller should back off
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// The endpoint rejected the request content
    #[error("Bad request: {message} ({BAD_REQUEST_HINT})")]
    BadRequest { message: String },

    /// Any other non-success HTTP status
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection-level failure before a status was received
    #[error("Request failed: {0}")]
    Network(String),

    /// Timeout during a transport call
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Response body could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A part was sent but no usable acknowledgment came back
    #[error("Empty acknowledgment for part {part}/{total}")]
    EmptyAcknowledgment { part: usize, total: usize },

    /// A single-shot or final-question exchange returned no text
    #[error("Empty response from endpoint")]
    EmptyResponse,

    /// Another delivery session is active
    #[error("A delivery is already in progress")]
    Busy,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File access error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of [`Error`] for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthFailure,
    RateLimited,
    BadRequest,
    GenericHttpError,
    Network,
    Timeout,
    MalformedResponse,
    EmptyAcknowledgment,
    Busy,
    Config,
    Io,
}

impl Error {
    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a rate limit error.
    pub fn rate_limited(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_secs,
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a generic HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create an I/O error for a path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth { .. } => ErrorKind::AuthFailure,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Http { .. } => ErrorKind::GenericHttpError,
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::MalformedResponse(_) | Self::Serialization(_) => ErrorKind::MalformedResponse,
            Self::EmptyAcknowledgment { .. } | Self::EmptyResponse => {
                ErrorKind::EmptyAcknowledgment
            }
            Self::Busy => ErrorKind::Busy,
            Self::Config(_) => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Whether the failure came from the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AuthFailure
                | ErrorKind::RateLimited
                | ErrorKind::BadRequest
                | ErrorKind::GenericHttpError
                | ErrorKind::Network
                | ErrorKind::Timeout
        )
    }

    /// Whether re-issuing the same request later could succeed.
    ///
    /// Nothing in this crate retries; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::auth("bad key").kind(), ErrorKind::AuthFailure);
        assert_eq!(
            Error::rate_limited("slow down", Some(30)).kind(),
            ErrorKind::RateLimited
        );
        assert_eq!(Error::bad_request("too big").kind(), ErrorKind::BadRequest);
        assert_eq!(Error::http(502, "gateway").kind(), ErrorKind::GenericHttpError);
        assert_eq!(
            Error::EmptyAcknowledgment { part: 2, total: 3 }.kind(),
            ErrorKind::EmptyAcknowledgment
        );
        assert_eq!(Error::Busy.kind(), ErrorKind::Busy);
    }

    #[test]
    fn test_bad_request_carries_hint() {
        let message = Error::bad_request("prompt is too long").to_string();
        assert!(message.contains("prompt is too long"));
        assert!(message.contains("streaming mode"));
    }

    #[test]
    fn test_transport_and_retryable() {
        assert!(Error::auth("x").is_transport());
        assert!(!Error::auth("x").is_retryable());
        assert!(Error::rate_limited("x", None).is_retryable());
        assert!(Error::http(503, "x").is_retryable());
        assert!(!Error::http(404, "x").is_retryable());
        assert!(!Error::Busy.is_transport());
        assert!(!Error::MalformedResponse("x".into()).is_transport());
    }
}
