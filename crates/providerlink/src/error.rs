//! Error types for provider access
//!
//! Every failure a caller can observe is one variant of [`Error`]. Transport
//! failures that should not surface as errors (a dropped channel after
//! dispatch) never reach this type; they become an absent result instead.

use providerlink_core::cancel::Canceled;
use providerlink_core::error_boundary;
use providerlink_transport::TransportError;
use thiserror::Error;
use url::Url;

/// Result type alias for provider access operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for provider access.
#[derive(Debug, Error)]
pub enum Error {
    /// No endpoint resolves for the target's authority.
    #[error("No provider found for {0}")]
    NotFound(String),

    /// The endpoint died, was recovered once, and died again.
    #[error("Provider endpoint died: {0}")]
    StaleEndpoint(String),

    /// The operation was canceled before or during dispatch.
    #[error("Operation canceled")]
    Canceled,

    /// A whole-file open produced a sub-range of a larger resource.
    #[error("{target} is not a whole file (declared length {declared_length})")]
    NotAWholeFile {
        /// Target that was opened
        target: Url,
        /// Length the endpoint declared for the window
        declared_length: i64,
    },

    /// The target has no authority or is otherwise unusable.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The target's scheme is not served by this layer.
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// An endpoint produced a descriptor that cannot be wrapped.
    #[error("Invalid stream descriptor: {0}")]
    InvalidDescriptor(String),

    /// A result was used after `close()`.
    #[error("Resource already closed: {0}")]
    Closed(&'static str),

    /// The endpoint does not implement the operation.
    #[error("Operation not supported by provider: {0}")]
    Unsupported(&'static str),

    /// The endpoint refused the request.
    #[error("Provider rejected request: {0}")]
    Rejected(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error for values crossing the transport.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Image decoding failed while loading a thumbnail.
    #[error("Failed to decode image: {0}")]
    Decode(#[source] anyhow::Error),

    /// Other errors not covered by specific variants.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether this error is a cancellation, whichever side observed it.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}

error_boundary!(Canceled => Error, |_e| Error::Canceled);

// Dropped is mapped for completeness; dispatch turns it into an absent
// result before it can get here.
error_boundary!(TransportError => Error, |e| match e {
    TransportError::StaleEndpoint(msg) => Error::StaleEndpoint(msg),
    TransportError::Dropped(msg) => Error::Other(anyhow::anyhow!("transport dropped: {msg}")),
    TransportError::Canceled => Error::Canceled,
    TransportError::Unsupported(op) => Error::Unsupported(op),
    TransportError::Rejected(msg) => Error::Rejected(msg),
    TransportError::Io(err) => Error::Io(err),
    TransportError::Serialization(msg) => Error::Serialization(msg),
});
