//! Endpoint and registry abstractions for providerlink
//!
//! Defines the capability surface of an out-of-process provider endpoint,
//! the registry that hands out reference-counted handles to endpoints, and
//! the live payloads (cursors, stream descriptors) endpoints produce.
//!
//! # Architecture
//!
//! - **Endpoint trait**: query/open/mutate capability of one provider
//! - **EndpointRegistry trait**: acquire/release/notify-dead over two retention tiers
//! - **Payloads**: `Cursor` rows and `AssetDescriptor` byte streams
//! - **Local registry**: in-process endpoints with per-tier holder counts
//! - **Error handling**: `TransportError` separating stale, dropped, and refused calls
//!
//! # Usage
//!
//! ```ignore
//! use providerlink_transport::{EndpointRegistry, Tier};
//!
//! let handle = registry.acquire("com.example.notes", Tier::Unstable)?;
//! let cursor = handle.endpoint().query(&target, &[], &QueryArgs::new(), None)?;
//! registry.release(handle);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod local;
pub mod mime;
pub mod payload;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use local::{IdlePolicy, LocalRegistry};
pub use payload::{AssetDescriptor, Cursor, RemoteStream, RowCursor, UNKNOWN_LENGTH};
pub use traits::{
    Endpoint, EndpointRegistry, Handle, HandleId, RemoteCancel, RemoteCancellable, Tier,
};
pub use types::{
    BatchOperation, BatchResult, Bundle, ContentValues, EXTRA_ORIENTATION, EXTRA_SIZE, OpenMode,
    QueryArgs,
};
