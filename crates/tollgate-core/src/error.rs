//! Shared error type across tollgate crates.

use thiserror::Error;

/// Stable error codes (rendered by the HTTP surface and asserted in tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed policy definition at deploy time.
    Configuration,
    /// A request could not be handed to one evaluator.
    Dispatch,
    /// Not every expected verdict arrived before the deadline.
    Timeout,
    /// Forwarding to the second tier failed.
    Downstream,
    /// Invalid input / malformed request tuple or config value.
    BadRequest,
    /// Correlation key already in flight.
    DuplicateKey,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal fault.
    Internal,
}

impl ErrorKind {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Dispatch => "DISPATCH",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Downstream => "DOWNSTREAM",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::DuplicateKey => "DUPLICATE_KEY",
            ErrorKind::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ThrottleError>;

/// Unified error type used by core and node.
#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("dispatch to policy {policy} failed: {reason}")]
    Dispatch { policy: String, reason: String },
    #[error("timed out after {waited_ms}ms waiting for verdicts of {key}")]
    Timeout { key: String, waited_ms: u64 },
    #[error("downstream: {0}")]
    Downstream(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("correlation key already in flight: {0}")]
    DuplicateKey(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl ThrottleError {
    /// Map an error to its stable code.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ThrottleError::Configuration(_) => ErrorKind::Configuration,
            ThrottleError::Dispatch { .. } => ErrorKind::Dispatch,
            ThrottleError::Timeout { .. } => ErrorKind::Timeout,
            ThrottleError::Downstream(_) => ErrorKind::Downstream,
            ThrottleError::BadRequest(_) => ErrorKind::BadRequest,
            ThrottleError::DuplicateKey(_) => ErrorKind::DuplicateKey,
            ThrottleError::UnsupportedVersion => ErrorKind::UnsupportedVersion,
            ThrottleError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a dispatch failure against one policy.
    pub fn dispatch(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        ThrottleError::Dispatch {
            policy: policy.into(),
            reason: reason.into(),
        }
    }
}
