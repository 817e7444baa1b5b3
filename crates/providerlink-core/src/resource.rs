//! Exactly-once close bookkeeping for resources tied to remote state.
//!
//! Results handed out by a provider (cursors, stream descriptors) hold on to
//! a reference-counted endpoint handle. Closing such a result must release
//! the handle exactly once, even when several threads race to close it.
//! [`CloseGuard`] is the atomic check-and-set at the heart of that contract.

use std::sync::atomic::{AtomicBool, Ordering};

/// Atomic "already closed" flag with leak reporting.
///
/// # Examples
///
/// ```rust
/// use providerlink_core::resource::CloseGuard;
///
/// let guard = CloseGuard::new("cursor");
/// assert!(guard.begin_close());  // first caller wins
/// assert!(!guard.begin_close()); // every later caller is a no-op
/// assert!(guard.is_closed());
/// ```
#[derive(Debug)]
pub struct CloseGuard {
    closed: AtomicBool,
    kind: &'static str,
}

impl CloseGuard {
    /// Create an open guard. `kind` names the resource in leak reports.
    pub fn new(kind: &'static str) -> Self {
        Self {
            closed: AtomicBool::new(false),
            kind,
        }
    }

    /// Try to transition open → closed.
    ///
    /// Returns `true` for exactly one caller across all threads; that caller
    /// owns the close work.
    pub fn begin_close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Whether the guard has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The resource kind this guard was created for.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Report a resource dropped without an explicit close.
    ///
    /// Returns `true` if the guard was still open, in which case the caller
    /// now owns the close work. A diagnostic is emitted when `warn` is set
    /// and the `tracing` feature is enabled.
    pub fn report_leak(&self, warn: bool) -> bool {
        if !self.begin_close() {
            return false;
        }
        if warn {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                resource = self.kind,
                "resource dropped without close(); releasing it now. Call close() explicitly"
            );
        }
        #[cfg(not(feature = "tracing"))]
        let _ = warn;
        true
    }
}
