//! Endpoint and registry traits
//!
//! An [`Endpoint`] is the capability exposed by an out-of-process provider.
//! An [`EndpointRegistry`] resolves an authority to a live endpoint and hands
//! out reference-counted [`Handle`]s to it in one of two retention tiers.

use crate::error::{Result, TransportError};
use crate::payload::{AssetDescriptor, Cursor};
use crate::types::{BatchOperation, BatchResult, Bundle, ContentValues, OpenMode, QueryArgs};
use providerlink_core::cancel::CancellationSignal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Retention tier of an acquired handle.
///
/// The registry may tear down an endpoint that only has unstable holders
/// (for example when it dies or is reclaimed); stable holders keep it alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Holder survives endpoint teardown and sees `StaleEndpoint` instead
    Unstable,
    /// Holder pins the endpoint
    Stable,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unstable => f.write_str("unstable"),
            Self::Stable => f.write_str("stable"),
        }
    }
}

/// Registry-assigned identity of one acquired handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// An acquired reference to a live endpoint.
///
/// Handles are deliberately not `Clone`: giving one back to
/// [`EndpointRegistry::release`] consumes it, so each handle is released at
/// most once.
pub struct Handle {
    id: HandleId,
    authority: String,
    tier: Tier,
    endpoint: Arc<dyn Endpoint>,
}

impl Handle {
    /// Create a handle. Intended for registry implementations.
    pub fn new(
        id: HandleId,
        authority: impl Into<String>,
        tier: Tier,
        endpoint: Arc<dyn Endpoint>,
    ) -> Self {
        Self {
            id,
            authority: authority.into(),
            tier,
            endpoint,
        }
    }

    /// Registry-assigned id
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Authority this handle was acquired for
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Retention tier
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// The endpoint capability
    pub fn endpoint(&self) -> &dyn Endpoint {
        self.endpoint.as_ref()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("authority", &self.authority)
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

/// Resolves authorities to live endpoints.
///
/// Implementations must be thread-safe and reference-count per tier. Several
/// independent callers may hold handles to the same authority at once.
pub trait EndpointRegistry: Send + Sync {
    /// Acquire a handle, starting the endpoint if needed. `None` if nothing
    /// serves `authority`.
    fn acquire(&self, authority: &str, tier: Tier) -> Option<Handle>;

    /// Give a handle back. Returns `false` if the registry did not consider
    /// the handle outstanding.
    fn release(&self, handle: Handle) -> bool;

    /// Report that the endpoint behind `handle` has died.
    fn notify_dead(&self, handle: &Handle);
}

/// The far side of a cancellation binding.
pub trait RemoteCancellable: Send + Sync {
    /// Ask the endpoint to abort the operation this cancellable was created for.
    fn cancel(&self) -> Result<()>;
}

/// An in-process endpoint can hand out a plain signal as its cancellable and
/// poll it while working.
impl RemoteCancellable for CancellationSignal {
    fn cancel(&self) -> Result<()> {
        CancellationSignal::cancel(self);
        Ok(())
    }
}

/// Remote cancellable passed into endpoint operations.
pub type RemoteCancel = Option<Arc<dyn RemoteCancellable>>;

/// Capability exposed by a provider endpoint.
///
/// Every method defaults to [`TransportError::Unsupported`] so endpoints only
/// implement what they serve.
#[allow(unused_variables)]
pub trait Endpoint: Send + Sync {
    /// Create a cancellable bound to this endpoint
    fn create_cancellation(&self) -> Result<Arc<dyn RemoteCancellable>> {
        Err(TransportError::Unsupported("create_cancellation"))
    }

    /// Run a query
    fn query(
        &self,
        target: &Url,
        projection: &[String],
        args: &QueryArgs,
        cancel: RemoteCancel,
    ) -> Result<Box<dyn Cursor>> {
        Err(TransportError::Unsupported("query"))
    }

    /// MIME type of the data at `target`
    fn get_type(&self, target: &Url) -> Result<Option<String>> {
        Err(TransportError::Unsupported("get_type"))
    }

    /// MIME types `target` can be streamed as, restricted to `mime_filter`
    fn get_stream_types(&self, target: &Url, mime_filter: &str) -> Result<Vec<String>> {
        Err(TransportError::Unsupported("get_stream_types"))
    }

    /// Raw (non-negotiated) open
    fn open_file(&self, target: &Url, mode: OpenMode, cancel: RemoteCancel) -> Result<AssetDescriptor> {
        Err(TransportError::Unsupported("open_file"))
    }

    /// Negotiated open: produce the data as some type matching `mime_filter`
    fn open_typed_asset(
        &self,
        target: &Url,
        mime_filter: &str,
        options: &Bundle,
        cancel: RemoteCancel,
    ) -> Result<Option<AssetDescriptor>> {
        Err(TransportError::Unsupported("open_typed_asset"))
    }

    /// Insert a row; returns the new row's target
    fn insert(&self, target: &Url, values: &ContentValues, extras: &Bundle) -> Result<Option<Url>> {
        Err(TransportError::Unsupported("insert"))
    }

    /// Update matching rows; returns the number affected
    fn update(&self, target: &Url, values: &ContentValues, args: &QueryArgs) -> Result<u64> {
        Err(TransportError::Unsupported("update"))
    }

    /// Delete matching rows; returns the number affected
    fn delete(&self, target: &Url, args: &QueryArgs) -> Result<u64> {
        Err(TransportError::Unsupported("delete"))
    }

    /// Insert many rows; returns the number inserted
    fn bulk_insert(&self, target: &Url, rows: &[ContentValues]) -> Result<u64> {
        let mut inserted = 0;
        for row in rows {
            if self.insert(target, row, &Bundle::new())?.is_some() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Apply a batch of operations
    fn apply_batch(&self, authority: &str, operations: &[BatchOperation]) -> Result<Vec<BatchResult>> {
        Err(TransportError::Unsupported("apply_batch"))
    }

    /// Provider-defined method call
    fn call(
        &self,
        authority: &str,
        method: &str,
        arg: Option<&str>,
        extras: &Bundle,
    ) -> Result<Option<Bundle>> {
        Err(TransportError::Unsupported("call"))
    }

    /// Convert `target` to a canonical form that stays valid across restarts
    fn canonicalize(&self, target: &Url) -> Result<Option<Url>> {
        Ok(None)
    }

    /// Reverse of [`canonicalize`](Self::canonicalize)
    fn uncanonicalize(&self, target: &Url) -> Result<Option<Url>> {
        Ok(Some(target.clone()))
    }

    /// Ask the endpoint to refresh `target` from its source of truth
    fn refresh(&self, target: &Url, extras: &Bundle, cancel: RemoteCancel) -> Result<bool> {
        Ok(false)
    }
}
