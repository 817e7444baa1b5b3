//! Scoped ownership of an acquired endpoint handle.

use providerlink_transport::{Endpoint, EndpointRegistry, Handle, HandleId, Tier};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Owns one acquired [`Handle`] and gives it back to its registry exactly once.
///
/// Dropping a lease releases the handle, so every early return and `?` in the
/// dispatch path releases what it acquired. Moving a lease into a result
/// wrapper hands the release over to that wrapper's `close()`.
pub struct Lease {
    registry: Arc<dyn EndpointRegistry>,
    // None only after release()
    handle: Option<Handle>,
}

impl Lease {
    /// Acquire a handle for `authority` in `tier`.
    pub(crate) fn acquire(
        registry: &Arc<dyn EndpointRegistry>,
        authority: &str,
        tier: Tier,
    ) -> Option<Self> {
        let handle = registry.acquire(authority, tier)?;
        debug!(authority, tier = %tier, handle = %handle.id(), "acquired endpoint handle");
        Some(Self {
            registry: Arc::clone(registry),
            handle: Some(handle),
        })
    }

    fn handle(&self) -> &Handle {
        self.handle
            .as_ref()
            .expect("lease holds its handle until released")
    }

    /// The leased endpoint capability
    pub fn endpoint(&self) -> &dyn Endpoint {
        self.handle().endpoint()
    }

    /// Id of the leased handle
    pub fn id(&self) -> HandleId {
        self.handle().id()
    }

    /// Tier of the leased handle
    pub fn tier(&self) -> Tier {
        self.handle().tier()
    }

    /// Tell the registry the leased endpoint died. The lease still has to be
    /// released.
    pub(crate) fn notify_dead(&self) {
        let handle = self.handle();
        debug!(handle = %handle.id(), authority = handle.authority(), "reporting dead endpoint");
        self.registry.notify_dead(handle);
    }

    /// Release the handle now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            let id = handle.id();
            if self.registry.release(handle) {
                debug!(handle = %id, "released endpoint handle");
            } else {
                warn!(handle = %id, "registry did not recognize released handle");
            }
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("handle", &self.handle).finish()
    }
}
