//! Cooperative cancellation.
//!
//! A [`CancellationSignal`] is shared between the caller that may cancel an
//! operation and the code performing it. Besides its own canceled flag it can
//! carry a *forwarding target*: something that should be told about the
//! cancel, typically a cancellable living on the far side of a process
//! boundary. The forwarding target is installed for the duration of one
//! operation and cleared afterwards.
//!
//! Cancellation is best-effort. Canceling after a result has been produced has
//! no effect on that result.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// Error returned when an operation observes a canceled signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation canceled")]
pub struct Canceled;

/// Receiver of forwarded cancel requests.
pub trait CancelTarget: Send + Sync {
    /// Deliver a cancel request. Must not block for long; failures are the
    /// implementor's to log.
    fn cancel(&self);
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct State {
    canceled: bool,
    // Set while cancel() runs callbacks outside the lock.
    in_progress: bool,
    listener: Option<Listener>,
    forward: Option<Arc<dyn CancelTarget>>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    idle: Condvar,
}

/// A cloneable cancellation token with an optional forwarding target.
///
/// Clones share state: canceling any clone cancels all of them.
///
/// # Examples
///
/// ```rust
/// use providerlink_core::cancel::{CancelTarget, CancellationSignal};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter(AtomicUsize);
/// impl CancelTarget for Counter {
///     fn cancel(&self) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let remote = Arc::new(Counter(AtomicUsize::new(0)));
/// let signal = CancellationSignal::new();
/// signal.set_forward_target(Some(remote.clone()));
/// signal.cancel();
/// assert_eq!(remote.0.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    /// Create an active (not canceled) signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `cancel()` has been called.
    pub fn is_canceled(&self) -> bool {
        self.inner.state.lock().canceled
    }

    /// Return `Err(Canceled)` if the signal has been canceled.
    pub fn check(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }

    /// Cancel the signal.
    ///
    /// The first call flips the state and invokes the listener and the
    /// forwarding target, if any, outside the internal lock. Later calls are
    /// no-ops.
    pub fn cancel(&self) {
        let (listener, forward) = {
            let mut state = self.inner.state.lock();
            if state.canceled {
                return;
            }
            state.canceled = true;
            state.in_progress = true;
            (state.listener.clone(), state.forward.clone())
        };

        if let Some(listener) = listener {
            listener();
        }
        if let Some(forward) = forward {
            forward.cancel();
        }

        let mut state = self.inner.state.lock();
        state.in_progress = false;
        self.inner.idle.notify_all();
    }

    /// Install or clear a local listener.
    ///
    /// If the signal is already canceled, the new listener runs immediately.
    pub fn set_on_cancel(&self, listener: Option<Arc<dyn Fn() + Send + Sync>>) {
        let fire = {
            let mut state = self.wait_idle();
            state.listener = listener.clone();
            state.canceled
        };
        if fire && let Some(listener) = listener {
            listener();
        }
    }

    /// Install or clear the forwarding target.
    ///
    /// Waits for an in-flight `cancel()` to finish delivering callbacks, so a
    /// target being cleared is never invoked after this returns. If the signal
    /// is already canceled when a target is installed, the target is canceled
    /// immediately and `true` is returned.
    pub fn set_forward_target(&self, target: Option<Arc<dyn CancelTarget>>) -> bool {
        let fire = {
            let mut state = self.wait_idle();
            state.forward = target.clone();
            state.canceled
        };
        match target {
            Some(target) if fire => {
                target.cancel();
                true
            }
            _ => false,
        }
    }

    /// Whether a forwarding target is currently installed.
    pub fn has_forward_target(&self) -> bool {
        self.inner.state.lock().forward.is_some()
    }

    fn wait_idle(&self) -> parking_lot::MutexGuard<'_, State> {
        let mut state = self.inner.state.lock();
        while state.in_progress {
            self.inner.idle.wait(&mut state);
        }
        state
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CancellationSignal")
            .field("canceled", &state.canceled)
            .field("forwarding", &state.forward.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct CountingTarget {
        hits: AtomicUsize,
    }

    impl CancelTarget for CountingTarget {
        fn cancel(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_cancel_is_sticky_and_idempotent() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_canceled());
        signal.cancel();
        signal.cancel();
        assert!(signal.is_canceled());
        assert_eq!(signal.check(), Err(Canceled));
    }

    #[test]
    fn test_clones_share_state() {
        let signal = CancellationSignal::new();
        let other = signal.clone();
        other.cancel();
        assert!(signal.is_canceled());
    }

    #[test]
    fn test_forward_target_receives_single_cancel() {
        let target = Arc::new(CountingTarget::default());
        let signal = CancellationSignal::new();
        assert!(!signal.set_forward_target(Some(target.clone())));

        signal.cancel();
        signal.cancel();
        assert_eq!(target.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cleared_target_is_not_invoked() {
        let target = Arc::new(CountingTarget::default());
        let signal = CancellationSignal::new();
        signal.set_forward_target(Some(target.clone()));
        signal.set_forward_target(None);

        signal.cancel();
        assert!(signal.is_canceled());
        assert_eq!(target.hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_install_after_cancel_fires_immediately() {
        let target = Arc::new(CountingTarget::default());
        let signal = CancellationSignal::new();
        signal.cancel();

        assert!(signal.set_forward_target(Some(target.clone())));
        assert_eq!(target.hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_runs_on_cancel() {
        let hits = Arc::new(AtomicUsize::new(0));
        let signal = CancellationSignal::new();
        let observed = Arc::clone(&hits);
        signal.set_on_cancel(Some(Arc::new(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        })));

        signal.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_cancel_forwards_once() {
        let target = Arc::new(CountingTarget::default());
        let signal = CancellationSignal::new();
        signal.set_forward_target(Some(target.clone()));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.cancel())
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(target.hits.load(Ordering::SeqCst), 1);
    }
}
