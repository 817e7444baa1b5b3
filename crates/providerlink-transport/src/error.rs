//! Transport error types

use providerlink_core::cancel::Canceled;
use std::fmt;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while talking to an endpoint
#[derive(Debug)]
pub enum TransportError {
    /// The remote endpoint died mid-call; the handle that served the call is defunct
    StaleEndpoint(String),

    /// Any other transport failure (broken channel, torn-down caller, ...)
    Dropped(String),

    /// The endpoint observed a cancel request and aborted the work
    Canceled,

    /// The endpoint does not implement the requested operation
    Unsupported(&'static str),

    /// The endpoint refused the request (bad arguments, unknown target, ...)
    Rejected(String),

    /// I/O error while producing or consuming a payload
    Io(std::io::Error),

    /// Serialization error for values carried across the transport
    Serialization(String),
}

impl TransportError {
    /// Whether this error means the endpoint itself is gone.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleEndpoint(_))
    }

    /// Whether this error is a non-staleness transport failure.
    ///
    /// Such failures are reported to callers as an absent result rather than
    /// an error.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::Dropped(_))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleEndpoint(msg) => write!(f, "Stale endpoint: {}", msg),
            Self::Dropped(msg) => write!(f, "Transport dropped: {}", msg),
            Self::Canceled => write!(f, "Canceled"),
            Self::Unsupported(op) => write!(f, "Unsupported operation: {}", op),
            Self::Rejected(msg) => write!(f, "Rejected: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<Canceled> for TransportError {
    fn from(_: Canceled) -> Self {
        Self::Canceled
    }
}
