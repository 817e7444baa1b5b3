//! # providerlink
//!
//! Resilient access to out-of-process data providers.
//!
//! Providers live in other processes and can die at any time. This crate
//! sits between application code and a provider [`EndpointRegistry`] and
//! gives every call the same discipline:
//!
//! - acquire a cheap *unstable* handle, dispatch, and if the endpoint turns
//!   out to be dead, report it, switch to a *stable* handle and retry once
//! - release every handle exactly once, or hand it to the returned
//!   [`ResourceCursor`] / [`ResourceStream`] whose `close()` releases it
//! - forward local cancellation to the endpoint while a call is in flight
//! - negotiate stream MIME types and enforce whole-file opens
//!
//! ## Quick Start
//!
//! ```rust
//! use providerlink::transport::{
//!     Endpoint, LocalRegistry, QueryArgs, RemoteCancel, Result as TransportResult, Cursor, RowCursor,
//! };
//! use providerlink::{Resolver, ResolverConfig};
//! use serde_json::json;
//! use std::sync::Arc;
//! use url::Url;
//!
//! struct Notes;
//!
//! impl Endpoint for Notes {
//!     fn query(&self, _: &Url, _: &[String], _: &QueryArgs, _: RemoteCancel) -> TransportResult<Box<dyn Cursor>> {
//!         Ok(Box::new(RowCursor::new(["title"]).with_row(vec![json!("groceries")])))
//!     }
//! }
//!
//! # fn main() -> providerlink::Result<()> {
//! let registry = Arc::new(LocalRegistry::new());
//! registry.register("com.example.notes", || Ok(Arc::new(Notes) as Arc<dyn Endpoint>));
//!
//! let resolver = Resolver::new(registry.clone(), ResolverConfig::default());
//! let target = Url::parse("content://com.example.notes/items").unwrap();
//!
//! let rows = resolver.query(&target, &[], &QueryArgs::new(), None)?.expect("rows");
//! assert_eq!(rows.count()?, 1);
//! rows.close();
//!
//! assert_eq!(registry.holders("com.example.notes"), (0, 0));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// Re-export commonly used types
pub use cancellation::{BridgeState, CancellationBridge};
pub use config::ResolverConfig;
pub use error::{Error, Result};
pub use lease::Lease;
pub use manager::ProviderHandleManager;
pub use negotiate::StreamNegotiator;
pub use resolver::Resolver;
pub use sampler::{InstrumentationSampler, OperationKind};
pub use thumbnail::{Bitmap, ImageDecoder, Size};
pub use wrapper::{ResourceCursor, ResourceStream};

pub use providerlink_core::cancel::{CancellationSignal, Canceled};
pub use providerlink_transport::{EndpointRegistry, Tier};

// Module declarations
pub mod cancellation;
pub mod config;
pub mod error;
pub mod lease;
pub mod manager;
pub mod negotiate;
pub mod resolver;
pub mod sampler;
pub mod target;
pub mod thumbnail;
pub mod wrapper;

/// Endpoint-side types: traits to implement, payloads to return.
pub use providerlink_transport as transport;

/// Prelude module for common imports
///
/// # Examples
///
/// ```rust
/// use providerlink::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        CancellationSignal, Error, ResourceCursor, ResourceStream, Resolver, ResolverConfig,
        Result,
        transport::{Bundle, ContentValues, OpenMode, QueryArgs},
    };
}

/// Crate version, from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
