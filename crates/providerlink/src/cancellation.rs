//! Bridging local cancellation signals to endpoint-side cancellables.
//!
//! A dispatch that carries a [`CancellationSignal`] asks the serving endpoint
//! for a remote cancellable and installs it as the signal's forwarding
//! target. While the operation runs, `signal.cancel()` reaches the endpoint.
//! When the operation finishes, whatever the outcome, the forwarding target is
//! removed so a late cancel cannot act on a stale remote reference.
//!
//! A cancel that lands just as the endpoint completes is resolved by the
//! endpoint: the caller sees either the result or `Canceled`. That race is
//! inherent to cooperative cancellation and is not papered over here.

use providerlink_core::cancel::{CancelTarget, CancellationSignal};
use providerlink_transport::{Endpoint, RemoteCancel, RemoteCancellable, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Lifecycle of one bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No forwarding target installed
    Unbound,
    /// Forwarding target installed, no cancel seen yet
    Bound,
    /// The signal was already canceled when binding was attempted
    CanceledBeforeBind,
    /// A cancel was forwarded to the endpoint
    Fired,
}

struct Forwarder {
    remote: Arc<dyn RemoteCancellable>,
    fired: AtomicBool,
}

impl CancelTarget for Forwarder {
    fn cancel(&self) {
        self.fired.store(true, Ordering::Release);
        if let Err(err) = self.remote.cancel() {
            debug!(error = %err, "remote cancel failed");
        }
    }
}

/// Binds an optional local signal to the endpoint serving the current attempt.
pub struct CancellationBridge<'a> {
    signal: Option<&'a CancellationSignal>,
    forwarder: Option<Arc<Forwarder>>,
    state: BridgeState,
}

impl<'a> CancellationBridge<'a> {
    /// Create an unbound bridge for `signal`.
    pub fn new(signal: Option<&'a CancellationSignal>) -> Self {
        Self {
            signal,
            forwarder: None,
            state: BridgeState::Unbound,
        }
    }

    /// Current state.
    pub fn state(&self) -> BridgeState {
        match &self.forwarder {
            Some(forwarder) if forwarder.fired.load(Ordering::Acquire) => BridgeState::Fired,
            _ => self.state,
        }
    }

    /// Bind to `endpoint`, replacing any earlier binding.
    ///
    /// Returns the remote cancellable to hand to the endpoint operation, or
    /// `None` when there is no signal or the endpoint cannot cancel remotely.
    /// A signal that is already canceled fails with
    /// [`TransportError::Canceled`] before any remote round trip.
    pub fn bind(&mut self, endpoint: &dyn Endpoint) -> Result<RemoteCancel, TransportError> {
        let Some(signal) = self.signal else {
            return Ok(None);
        };
        self.clear();

        if signal.is_canceled() {
            self.state = BridgeState::CanceledBeforeBind;
            return Err(TransportError::Canceled);
        }

        let remote = match endpoint.create_cancellation() {
            Ok(remote) => remote,
            Err(TransportError::Unsupported(_)) => {
                debug!("endpoint has no remote cancellation; cancel stays local");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let forwarder = Arc::new(Forwarder {
            remote: Arc::clone(&remote),
            fired: AtomicBool::new(false),
        });
        // A cancel racing this install is forwarded immediately by the signal.
        signal.set_forward_target(Some(forwarder.clone() as Arc<dyn CancelTarget>));
        self.forwarder = Some(forwarder);
        self.state = BridgeState::Bound;
        Ok(Some(remote))
    }

    /// Remove the forwarding target, if this bridge installed one.
    pub fn clear(&mut self) {
        if let (Some(signal), Some(forwarder)) = (self.signal, self.forwarder.take()) {
            signal.set_forward_target(None);
            if forwarder.fired.load(Ordering::Acquire) {
                self.state = BridgeState::Fired;
            } else {
                self.state = BridgeState::Unbound;
            }
        }
    }
}

impl Drop for CancellationBridge<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use providerlink_transport::Result as TransportResult;

    mock! {
        Remote {}
        impl RemoteCancellable for Remote {
            fn cancel(&self) -> TransportResult<()>;
        }
    }

    struct CancellableEndpoint {
        remote: Arc<dyn RemoteCancellable>,
    }

    impl Endpoint for CancellableEndpoint {
        fn create_cancellation(&self) -> TransportResult<Arc<dyn RemoteCancellable>> {
            Ok(Arc::clone(&self.remote))
        }
    }

    struct PlainEndpoint;
    impl Endpoint for PlainEndpoint {}

    fn endpoint_with(remote: MockRemote) -> CancellableEndpoint {
        CancellableEndpoint {
            remote: Arc::new(remote),
        }
    }

    #[test]
    fn test_no_signal_stays_unbound() {
        let endpoint = endpoint_with(MockRemote::new());
        let mut bridge = CancellationBridge::new(None);
        assert!(bridge.bind(&endpoint).unwrap().is_none());
        assert_eq!(bridge.state(), BridgeState::Unbound);
    }

    #[test]
    fn test_pre_canceled_signal_fails_without_round_trip() {
        struct NoRoundTrip;
        impl Endpoint for NoRoundTrip {
            fn create_cancellation(&self) -> TransportResult<Arc<dyn RemoteCancellable>> {
                panic!("must not create a remote cancellable for a canceled signal");
            }
        }

        let signal = CancellationSignal::new();
        signal.cancel();
        let mut bridge = CancellationBridge::new(Some(&signal));
        assert!(matches!(bridge.bind(&NoRoundTrip), Err(TransportError::Canceled)));
        assert_eq!(bridge.state(), BridgeState::CanceledBeforeBind);
    }

    #[test]
    fn test_cancel_while_bound_is_forwarded() {
        let mut remote = MockRemote::new();
        remote.expect_cancel().times(1).returning(|| Ok(()));
        let endpoint = endpoint_with(remote);

        let signal = CancellationSignal::new();
        let mut bridge = CancellationBridge::new(Some(&signal));
        assert!(bridge.bind(&endpoint).unwrap().is_some());
        assert_eq!(bridge.state(), BridgeState::Bound);

        signal.cancel();
        assert_eq!(bridge.state(), BridgeState::Fired);
    }

    #[test]
    fn test_cancel_after_completion_is_local_only() {
        let mut remote = MockRemote::new();
        remote.expect_cancel().times(0);
        let endpoint = endpoint_with(remote);

        let signal = CancellationSignal::new();
        {
            let mut bridge = CancellationBridge::new(Some(&signal));
            bridge.bind(&endpoint).unwrap();
        }
        assert!(!signal.has_forward_target());
        signal.cancel();
        assert!(signal.is_canceled());
    }

    #[test]
    fn test_remote_cancel_failure_is_swallowed() {
        let mut remote = MockRemote::new();
        remote
            .expect_cancel()
            .times(1)
            .returning(|| Err(TransportError::Dropped("binder gone".into())));
        let endpoint = endpoint_with(remote);

        let signal = CancellationSignal::new();
        let mut bridge = CancellationBridge::new(Some(&signal));
        bridge.bind(&endpoint).unwrap();
        signal.cancel();
        assert_eq!(bridge.state(), BridgeState::Fired);
    }

    #[test]
    fn test_endpoint_without_remote_cancellation() {
        let signal = CancellationSignal::new();
        let mut bridge = CancellationBridge::new(Some(&signal));
        assert!(bridge.bind(&PlainEndpoint).unwrap().is_none());
        assert!(!signal.has_forward_target());
    }

    #[test]
    fn test_rebind_replaces_forwarding_target() {
        let mut first = MockRemote::new();
        first.expect_cancel().times(0);
        let mut second = MockRemote::new();
        second.expect_cancel().times(1).returning(|| Ok(()));
        let (first, second) = (endpoint_with(first), endpoint_with(second));

        let signal = CancellationSignal::new();
        let mut bridge = CancellationBridge::new(Some(&signal));
        bridge.bind(&first).unwrap();
        bridge.bind(&second).unwrap();
        signal.cancel();
    }
}
