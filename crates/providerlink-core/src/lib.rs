#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core primitives for the providerlink ecosystem.
//!
//! This crate provides the small, dependency-light building blocks that the
//! transport and resolver crates share:
//!
//! - **Cooperative cancellation** via [`CancellationSignal`](cancel::CancellationSignal)
//!   - Local cancel state plus an optional forwarding target
//!   - Forwarding target can be installed and cleared per operation
//! - **Exactly-once close** via [`CloseGuard`](resource::CloseGuard)
//! - **Declarative error boundaries** via the `error_boundary!` macro
//!
//! # Examples
//!
//! ```rust
//! use providerlink_core::prelude::*;
//!
//! let signal = CancellationSignal::new();
//! assert!(signal.check().is_ok());
//!
//! signal.cancel();
//! assert!(signal.check().is_err());
//! ```

pub mod cancel;
mod error;
pub mod resource;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use providerlink_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cancel::{CancelTarget, CancellationSignal, Canceled};
    pub use crate::error_boundary;
    pub use crate::resource::CloseGuard;
}
