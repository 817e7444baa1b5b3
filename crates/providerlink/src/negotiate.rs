//! MIME-typed stream negotiation.
//!
//! Opening a provider target for reading goes through negotiation: the
//! request carries a MIME filter and the endpoint may convert the resource to
//! any type matching it. A plain read is negotiated with `*/*`, which leaves
//! the endpoint free to convert transparently. Writes, and targets that are
//! not served by a provider, are opened raw.
//!
//! Results carry a declared length. `-1` means the stream is the whole
//! resource; anything else means it is a window into a larger one. Callers
//! that need an independent file use [`StreamNegotiator::open_file`], which
//! rejects windows.

use crate::error::{Error, Result};
use crate::manager::{ProviderHandleManager, Served};
use crate::sampler::OperationKind;
use crate::target::{SCHEME_CONTENT, SCHEME_FILE};
use crate::wrapper::ResourceStream;
use providerlink_core::cancel::CancellationSignal;
use providerlink_transport::mime::WILDCARD;
use providerlink_transport::{AssetDescriptor, Bundle, OpenMode};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Opens streams for targets, negotiating MIME types where possible.
#[derive(Clone)]
pub struct StreamNegotiator {
    manager: Arc<ProviderHandleManager>,
}

impl StreamNegotiator {
    /// Create a negotiator dispatching through `manager`.
    pub fn new(manager: Arc<ProviderHandleManager>) -> Self {
        Self { manager }
    }

    /// Open `target` as some MIME type matching `mime_filter`.
    ///
    /// `options` are passed to the endpoint unchanged (for example a
    /// requested thumbnail size). Returns `Ok(None)` if the endpoint has no
    /// matching representation or the transport dropped the call.
    pub fn open_typed_stream(
        &self,
        target: &Url,
        mime_filter: &str,
        options: &Bundle,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Option<ResourceStream>> {
        let served = self.manager.dispatch(
            target,
            OperationKind::OpenTypedAssetStream,
            cancel,
            |endpoint, remote| endpoint.open_typed_asset(target, mime_filter, options, remote),
        )?;

        match served {
            Some(Served {
                value: Some(descriptor),
                lease,
            }) => self
                .manager
                .wrap_stream(Served {
                    value: descriptor,
                    lease,
                })
                .map(Some),
            // No representation: the lease drops here and is released.
            Some(Served { value: None, .. }) | None => Ok(None),
        }
    }

    /// Open `target` without negotiation.
    pub fn open_raw(
        &self,
        target: &Url,
        mode: OpenMode,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Option<ResourceStream>> {
        let served = self.manager.dispatch(
            target,
            OperationKind::OpenAssetStream,
            cancel,
            |endpoint, remote| endpoint.open_file(target, mode, remote),
        )?;
        served.map(|served| self.manager.wrap_stream(served)).transpose()
    }

    /// Open `target` in `mode`, routing by scheme.
    ///
    /// - provider targets opened read-only are negotiated with `*/*`
    /// - provider targets opened for writing are opened raw
    /// - `file` targets are opened from the local filesystem
    pub fn open_asset(
        &self,
        target: &Url,
        mode: OpenMode,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Option<ResourceStream>> {
        match target.scheme() {
            SCHEME_CONTENT if mode.is_read_only() => {
                self.open_typed_stream(target, WILDCARD, &Bundle::new(), cancel)
            }
            SCHEME_CONTENT => self.open_raw(target, mode, cancel),
            SCHEME_FILE => self.open_local(target, mode).map(Some),
            other => Err(Error::UnsupportedScheme(other.to_string())),
        }
    }

    /// Open `target` as a whole, independent file.
    ///
    /// A result that is only a window into a larger resource is closed and
    /// rejected with [`Error::NotAWholeFile`].
    pub fn open_file(
        &self,
        target: &Url,
        mode: OpenMode,
        cancel: Option<&CancellationSignal>,
    ) -> Result<Option<ResourceStream>> {
        let Some(stream) = self.open_asset(target, mode, cancel)? else {
            return Ok(None);
        };
        if stream.is_whole_file() {
            return Ok(Some(stream));
        }

        let declared_length = stream.declared_length();
        if let Err(err) = stream.close() {
            debug!(target = %target, error = %err, "error closing rejected window stream");
        }
        Err(Error::NotAWholeFile {
            target: target.clone(),
            declared_length,
        })
    }

    /// MIME types `target` can be opened as, restricted to `mime_filter`.
    pub fn get_stream_types(&self, target: &Url, mime_filter: &str) -> Result<Vec<String>> {
        let served = self.manager.dispatch(
            target,
            OperationKind::GetStreamTypes,
            None,
            |endpoint, _| endpoint.get_stream_types(target, mime_filter),
        )?;
        Ok(served.map(|served| served.value).unwrap_or_default())
    }

    fn open_local(&self, target: &Url, mode: OpenMode) -> Result<ResourceStream> {
        let path = target
            .to_file_path()
            .map_err(|()| Error::InvalidTarget(format!("{target} is not a local path")))?;

        let file = OpenOptions::new()
            .read(mode.can_read())
            .write(mode.can_write() && !mode.appends())
            .append(mode.appends())
            .truncate(mode.truncates())
            .create(mode.can_write())
            .open(&path)?;
        debug!(path = %path.display(), mode = %mode, "opened local file");

        self.manager
            .wrap_unleased(AssetDescriptor::whole(Box::new(file)))
    }
}
