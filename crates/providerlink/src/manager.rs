//! Resilient dispatch against provider endpoints.
//!
//! Every operation goes through [`ProviderHandleManager::dispatch`]:
//!
//! ```text
//! acquire(unstable) ── none ──▶ NotFound
//!        │
//!   canceled? ── yes ──▶ Canceled            (no remote work)
//!        │
//!   bind cancel, dispatch
//!        ├─ ok ──────────────▶ Served { value, lease: unstable }
//!        ├─ dropped ─────────▶ Ok(None)      (soft failure)
//!        └─ stale
//!             notify_dead(unstable), release(unstable)
//!             acquire(stable) ── none ──▶ NotFound
//!             rebind cancel, dispatch once
//!                ├─ ok ──────▶ Served { value, lease: stable }
//!                ├─ dropped ─▶ Ok(None)
//!                └─ stale ───▶ StaleEndpoint (final)
//! ```
//!
//! The lease of the handle that served the successful attempt travels with
//! the value; the caller either hands it to a result wrapper or drops it,
//! which releases the handle. Every other lease is released before
//! `dispatch` returns.

use crate::cancellation::CancellationBridge;
use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::lease::Lease;
use crate::sampler::{InstrumentationSampler, OperationKind};
use crate::target;
use crate::wrapper::{ResourceCursor, ResourceStream};
use providerlink_core::cancel::CancellationSignal;
use providerlink_transport::{
    AssetDescriptor, Cursor, Endpoint, EndpointRegistry, RemoteCancel, Tier, TransportError,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// A successful dispatch: the value and the lease of the handle that served it.
pub(crate) struct Served<T> {
    pub(crate) value: T,
    pub(crate) lease: Lease,
}

/// Owns the acquire/dispatch/recover/release algorithm.
pub struct ProviderHandleManager {
    registry: Arc<dyn EndpointRegistry>,
    sampler: InstrumentationSampler,
    leak_warnings: bool,
}

impl ProviderHandleManager {
    /// Create a manager over `registry`.
    pub fn new(registry: Arc<dyn EndpointRegistry>, config: &ResolverConfig) -> Self {
        Self {
            registry,
            sampler: InstrumentationSampler::new(config),
            leak_warnings: config.leak_warnings,
        }
    }

    /// The registry handles are acquired from
    pub fn registry(&self) -> &Arc<dyn EndpointRegistry> {
        &self.registry
    }

    /// Run `op` against the endpoint serving `target`, recovering once from a
    /// dead endpoint.
    ///
    /// `op` may run twice (once per tier) and must be safe to repeat.
    /// Returns `Ok(None)` when the transport dropped the call.
    pub(crate) fn dispatch<T, F>(
        &self,
        target: &Url,
        kind: OperationKind,
        cancel: Option<&CancellationSignal>,
        mut op: F,
    ) -> Result<Option<Served<T>>>
    where
        F: FnMut(&dyn Endpoint, RemoteCancel) -> providerlink_transport::Result<T>,
    {
        let authority = target::authority(target)?;
        let unstable = Lease::acquire(&self.registry, authority, Tier::Unstable)
            .ok_or_else(|| Error::NotFound(authority.to_string()))?;

        if let Some(signal) = cancel {
            signal.check()?;
        }

        // Dropped after the served lease is moved out, which clears the
        // forwarding target on every exit path.
        let mut bridge = CancellationBridge::new(cancel);

        let stale = match self.attempt(&unstable, &mut bridge, target, kind, &mut op) {
            Ok(value) => {
                return Ok(Some(Served {
                    value,
                    lease: unstable,
                }));
            }
            Err(err) if err.is_stale() => err,
            Err(err) => return settle(err, target, kind),
        };

        debug!(
            operation = kind.as_str(),
            authority,
            handle = %unstable.id(),
            error = %stale,
            "endpoint died during dispatch; retrying on a stable handle"
        );
        unstable.notify_dead();
        unstable.release();

        let stable = Lease::acquire(&self.registry, authority, Tier::Stable)
            .ok_or_else(|| Error::NotFound(authority.to_string()))?;

        match self.attempt(&stable, &mut bridge, target, kind, &mut op) {
            Ok(value) => Ok(Some(Served {
                value,
                lease: stable,
            })),
            Err(err) if err.is_stale() => {
                warn!(
                    operation = kind.as_str(),
                    authority,
                    handle = %stable.id(),
                    "endpoint died again after recovery; giving up"
                );
                stable.notify_dead();
                Err(err.into())
            }
            Err(err) => settle(err, target, kind),
        }
    }

    fn attempt<T, F>(
        &self,
        lease: &Lease,
        bridge: &mut CancellationBridge<'_>,
        target: &Url,
        kind: OperationKind,
        op: &mut F,
    ) -> providerlink_transport::Result<T>
    where
        F: FnMut(&dyn Endpoint, RemoteCancel) -> providerlink_transport::Result<T>,
    {
        let remote = bridge.bind(lease.endpoint())?;
        let started = Instant::now();
        let result = op(lease.endpoint(), remote);
        self.sampler.record(kind, target, started.elapsed());
        result
    }

    /// Hand a served cursor to a wrapper that owns its lease.
    pub(crate) fn wrap_cursor(&self, served: Served<Box<dyn Cursor>>) -> ResourceCursor {
        ResourceCursor::new(served.value, served.lease, self.leak_warnings)
    }

    /// Hand a served descriptor to a wrapper that owns its lease.
    pub(crate) fn wrap_stream(&self, served: Served<AssetDescriptor>) -> Result<ResourceStream> {
        ResourceStream::bind(served.value, Some(served.lease), self.leak_warnings)
    }

    /// Wrap a descriptor that is not backed by a provider handle.
    pub(crate) fn wrap_unleased(&self, descriptor: AssetDescriptor) -> Result<ResourceStream> {
        ResourceStream::bind(descriptor, None, self.leak_warnings)
    }
}

fn settle<T>(err: TransportError, target: &Url, kind: OperationKind) -> Result<Option<T>> {
    if err.is_soft() {
        debug!(
            operation = kind.as_str(),
            target = %target,
            error = %err,
            "transport dropped the call; returning no result"
        );
        return Ok(None);
    }
    Err(err.into())
}
