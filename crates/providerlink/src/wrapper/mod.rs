//! Result wrappers that tie remote payloads to handle release.
//!
//! A query or open that succeeds hands its [`Lease`] to a wrapper. The
//! wrapper's `close()` closes the payload and then releases the lease; it is
//! idempotent and safe to call from several threads at once. Dropping a
//! wrapper that was never closed logs a leak warning and performs the close.

mod cursor;
mod stream;

pub use cursor::ResourceCursor;
pub use stream::ResourceStream;

use crate::lease::Lease;
use parking_lot::Mutex;
use providerlink_core::resource::CloseGuard;
use std::io;

/// Something a wrapper can close.
pub(crate) trait Payload: Send {
    fn close_payload(&mut self) -> io::Result<()>;
}

/// Shared close machinery for both wrapper variants.
pub(crate) struct Bound<P: Payload> {
    guard: CloseGuard,
    slot: Mutex<Option<(P, Option<Lease>)>>,
    leak_warnings: bool,
}

impl<P: Payload> Bound<P> {
    pub(crate) fn new(kind: &'static str, payload: P, lease: Option<Lease>, leak_warnings: bool) -> Self {
        Self {
            guard: CloseGuard::new(kind),
            slot: Mutex::new(Some((payload, lease))),
            leak_warnings,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.guard.kind()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.guard.is_closed()
    }

    /// Run `f` against the payload; `None` once closed.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut P) -> R) -> Option<R> {
        if self.guard.is_closed() {
            return None;
        }
        self.slot.lock().as_mut().map(|(payload, _)| f(payload))
    }

    /// Like [`with`](Self::with) but without locking.
    pub(crate) fn with_mut<R>(&mut self, f: impl FnOnce(&mut P) -> R) -> Option<R> {
        if self.guard.is_closed() {
            return None;
        }
        self.slot.get_mut().as_mut().map(|(payload, _)| f(payload))
    }

    pub(crate) fn close(&self) -> io::Result<()> {
        if !self.guard.begin_close() {
            return Ok(());
        }
        self.finish()
    }

    fn finish(&self) -> io::Result<()> {
        let Some((mut payload, lease)) = self.slot.lock().take() else {
            return Ok(());
        };
        let closed = payload.close_payload();
        if let Some(lease) = lease {
            lease.release();
        }
        closed
    }
}

impl<P: Payload> Drop for Bound<P> {
    fn drop(&mut self) {
        if self.guard.report_leak(self.leak_warnings) {
            let _ = self.finish();
        }
    }
}
