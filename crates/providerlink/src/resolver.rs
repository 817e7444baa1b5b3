//! The upward API.

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::manager::{ProviderHandleManager, Served};
use crate::negotiate::StreamNegotiator;
use crate::sampler::OperationKind;
use crate::target;
use crate::thumbnail::{self, Bitmap, ImageDecoder, Size};
use crate::wrapper::{ResourceCursor, ResourceStream};
use providerlink_core::cancel::CancellationSignal;
use providerlink_transport::{
    BatchOperation, BatchResult, Bundle, ContentValues, EndpointRegistry, OpenMode, QueryArgs,
};
use std::sync::Arc;
use url::Url;

/// Entry point for talking to providers.
///
/// Every operation acquires a handle for the target's authority, dispatches
/// through it, recovers once if the endpoint died, and releases the handle
/// (or hands it to the returned cursor or stream). An operation whose call
/// was dropped by the transport returns an empty result instead of an error.
///
/// # Examples
///
/// ```rust,no_run
/// use providerlink::{Resolver, ResolverConfig};
/// use providerlink::transport::{LocalRegistry, QueryArgs};
/// use std::sync::Arc;
/// use url::Url;
///
/// # fn main() -> providerlink::Result<()> {
/// let registry = Arc::new(LocalRegistry::new());
/// let resolver = Resolver::new(registry, ResolverConfig::default());
///
/// let target = Url::parse("content://com.example.notes/items").unwrap();
/// if let Some(rows) = resolver.query(&target, &[], &QueryArgs::new(), None)? {
///     println!("{} notes", rows.count()?);
///     rows.close();
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Resolver {
    manager: Arc<ProviderHandleManager>,
    negotiator: StreamNegotiator,
    config: ResolverConfig,
}

impl Resolver {
    /// Create a resolver over `registry`.
    pub fn new(registry: Arc<dyn EndpointRegistry>, config: ResolverConfig) -> Self {
        let manager = Arc::new(ProviderHandleManager::new(registry, &config));
        Self {
            negotiator: StreamNegotiator::new(Arc::clone(&manager)),
            manager,
            config,
        }
    }

    /// Create a resolver configured from the environment.
    #[cfg(feature = "env")]
    pub fn from_env(registry: Arc<dyn EndpointRegistry>) -> Self {
        Self::new(registry, ResolverConfig::from_env())
    }

    /// Active configuration
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The dispatching manager
    pub fn manager(&self) -> &Arc<ProviderHandleManager> {
        &self.manager
    }

    /// The stream negotiator
    pub fn negotiator(&self) -> &StreamNegotiator {
        &self.negotiator
    }

    /// Query `target`.
    ///
    /// The row count is forced before the cursor is returned, so an endpoint
    /// that dies while producing rows is recovered like one that died before
    /// answering. The returned cursor holds the handle until closed.
    pub fn query(
        &self,
        target: &Url,
        projection: &[String],
        args: &QueryArgs,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Option<ResourceCursor>> {
        let served = self
            .manager
            .dispatch(target, OperationKind::Query, cancel, |endpoint, remote| {
                let mut cursor = endpoint.query(target, projection, args, remote)?;
                if let Err(err) = cursor.count() {
                    cursor.close();
                    return Err(err);
                }
                Ok(cursor)
            })?;
        Ok(served.map(|served| self.manager.wrap_cursor(served)))
    }

    /// MIME type of the data at `target`
    pub fn get_type(&self, target: &Url) -> Result<Option<String>> {
        let served = self
            .manager
            .dispatch(target, OperationKind::GetType, None, |endpoint, _| {
                endpoint.get_type(target)
            })?;
        Ok(value(served).flatten())
    }

    /// MIME types `target` can be opened as, restricted to `mime_filter`
    pub fn get_stream_types(&self, target: &Url, mime_filter: &str) -> Result<Vec<String>> {
        self.negotiator.get_stream_types(target, mime_filter)
    }

    /// Insert a row under `target`; returns the new row's target.
    pub fn insert(&self, target: &Url, values: &ContentValues, extras: &Bundle) -> Result<Option<Url>> {
        let served = self
            .manager
            .dispatch(target, OperationKind::Insert, None, |endpoint, _| {
                endpoint.insert(target, values, extras)
            })?;
        Ok(value(served).flatten())
    }

    /// Update rows matching `args`; returns the number updated.
    pub fn update(&self, target: &Url, values: &ContentValues, args: &QueryArgs) -> Result<u64> {
        let served = self
            .manager
            .dispatch(target, OperationKind::Update, None, |endpoint, _| {
                endpoint.update(target, values, args)
            })?;
        Ok(value(served).unwrap_or(0))
    }

    /// Delete rows matching `args`; returns the number deleted.
    pub fn delete(&self, target: &Url, args: &QueryArgs) -> Result<u64> {
        let served = self
            .manager
            .dispatch(target, OperationKind::Delete, None, |endpoint, _| {
                endpoint.delete(target, args)
            })?;
        Ok(value(served).unwrap_or(0))
    }

    /// Insert `rows` under `target`; returns the number inserted.
    pub fn bulk_insert(&self, target: &Url, rows: &[ContentValues]) -> Result<u64> {
        let served = self
            .manager
            .dispatch(target, OperationKind::BulkInsert, None, |endpoint, _| {
                endpoint.bulk_insert(target, rows)
            })?;
        Ok(value(served).unwrap_or(0))
    }

    /// Apply `operations` to the provider registered for `authority`.
    pub fn apply_batch(&self, authority: &str, operations: &[BatchOperation]) -> Result<Vec<BatchResult>> {
        let root = target::provider_root(authority)?;
        if let Some(stray) = operations
            .iter()
            .map(BatchOperation::target)
            .find(|t| target::authority(t).ok() != Some(authority))
        {
            return Err(Error::InvalidTarget(format!(
                "batch for {authority} contains operation on {stray}"
            )));
        }

        let served = self
            .manager
            .dispatch(&root, OperationKind::ApplyBatch, None, |endpoint, _| {
                endpoint.apply_batch(authority, operations)
            })?;
        Ok(value(served).unwrap_or_default())
    }

    /// Call a provider-defined `method` on the provider for `authority`.
    pub fn call(
        &self,
        authority: &str,
        method: &str,
        arg: Option<&str>,
        extras: &Bundle,
    ) -> Result<Option<Bundle>> {
        let root = target::provider_root(authority)?;
        let served = self
            .manager
            .dispatch(&root, OperationKind::Call, None, |endpoint, _| {
                endpoint.call(authority, method, arg, extras)
            })?;
        Ok(value(served).flatten())
    }

    /// Canonical form of `target`, if the provider has one.
    pub fn canonicalize(&self, target: &Url) -> Result<Option<Url>> {
        let served = self
            .manager
            .dispatch(target, OperationKind::Canonicalize, None, |endpoint, _| {
                endpoint.canonicalize(target)
            })?;
        Ok(value(served).flatten())
    }

    /// Local form of a canonical `target`, or `None` if it no longer exists.
    pub fn uncanonicalize(&self, target: &Url) -> Result<Option<Url>> {
        let served = self
            .manager
            .dispatch(target, OperationKind::Uncanonicalize, None, |endpoint, _| {
                endpoint.uncanonicalize(target)
            })?;
        Ok(value(served).flatten())
    }

    /// Ask the provider to refresh `target`. `true` if it did.
    pub fn refresh(
        &self,
        target: &Url,
        extras: &Bundle,
        cancel: Option<&CancellationSignal>,
    ) -> Result<bool> {
        let served = self
            .manager
            .dispatch(target, OperationKind::Refresh, cancel, |endpoint, remote| {
                endpoint.refresh(target, extras, remote)
            })?;
        Ok(value(served).unwrap_or(false))
    }

    /// See [`StreamNegotiator::open_typed_stream`].
    pub fn open_typed_stream(
        &self,
        target: &Url,
        mime_filter: &str,
        options: &Bundle,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Option<ResourceStream>> {
        self.negotiator
            .open_typed_stream(target, mime_filter, options, cancel)
    }

    /// See [`StreamNegotiator::open_asset`].
    pub fn open_asset(
        &self,
        target: &Url,
        mode: OpenMode,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Option<ResourceStream>> {
        self.negotiator.open_asset(target, mode, cancel)
    }

    /// See [`StreamNegotiator::open_file`].
    pub fn open_file(
        &self,
        target: &Url,
        mode: OpenMode,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Option<ResourceStream>> {
        self.negotiator.open_file(target, mode, cancel)
    }

    /// Open `target` for reading.
    pub fn open_input_stream(&self, target: &Url) -> Result<ResourceStream> {
        self.open_asset(target, OpenMode::Read, None)?
            .ok_or_else(|| Error::NotFound(format!("no stream for {target}")))
    }

    /// Open `target` for writing.
    pub fn open_output_stream(&self, target: &Url) -> Result<ResourceStream> {
        self.open_asset(target, OpenMode::Write, None)?
            .ok_or_else(|| Error::NotFound(format!("no stream for {target}")))
    }

    /// Load a thumbnail of `target` no smaller than needed to fill `size`.
    pub fn load_thumbnail(
        &self,
        target: &Url,
        size: Size,
        decoder: &dyn ImageDecoder,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Bitmap> {
        thumbnail::load(
            &self.negotiator,
            &self.config.thumbnail_mime_filter,
            target,
            size,
            decoder,
            cancel,
        )
    }
}

// Plain values need no handle once served; the lease drops here.
fn value<T>(served: Option<Served<T>>) -> Option<T> {
    served.map(|served| served.value)
}
