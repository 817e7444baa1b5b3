//! Slow-call sampling.
//!
//! Each dispatched operation reports its duration here. Calls at or above the
//! configured threshold are always logged; faster calls are logged with a
//! probability proportional to their duration, so cheap calls rarely show up.
//! Sampling is a side effect only and never affects the call result.

use crate::config::ResolverConfig;
use rand::Rng;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Kinds of operation dispatched through the handle manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Row query
    Query,
    /// MIME type lookup
    GetType,
    /// Stream type listing
    GetStreamTypes,
    /// Raw stream open
    OpenAssetStream,
    /// Negotiated stream open
    OpenTypedAssetStream,
    /// Row insert
    Insert,
    /// Row update
    Update,
    /// Row delete
    Delete,
    /// Multi-row insert
    BulkInsert,
    /// Batched mutations
    ApplyBatch,
    /// Provider-defined call
    Call,
    /// Target canonicalization
    Canonicalize,
    /// Reverse canonicalization
    Uncanonicalize,
    /// Refresh from source of truth
    Refresh,
}

impl OperationKind {
    /// Stable name used in log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::GetType => "get_type",
            Self::GetStreamTypes => "get_stream_types",
            Self::OpenAssetStream => "open_asset_stream",
            Self::OpenTypedAssetStream => "open_typed_asset_stream",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BulkInsert => "bulk_insert",
            Self::ApplyBatch => "apply_batch",
            Self::Call => "call",
            Self::Canonicalize => "canonicalize",
            Self::Uncanonicalize => "uncanonicalize",
            Self::Refresh => "refresh",
        }
    }
}

/// Probabilistic slow-call logger.
#[derive(Debug, Clone)]
pub struct InstrumentationSampler {
    threshold: Duration,
    enabled: bool,
}

impl InstrumentationSampler {
    /// Create a sampler from resolver configuration
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            threshold: config.slow_call_threshold,
            enabled: config.sampling,
        }
    }

    /// Percent chance (1..=100) that a call of `duration` is logged.
    pub fn sample_percent(&self, duration: Duration) -> u32 {
        let threshold = self.threshold.as_millis();
        let elapsed = duration.as_millis();
        if threshold == 0 || elapsed >= threshold {
            return 100;
        }
        (100 * elapsed / threshold) as u32 + 1
    }

    /// Record one completed dispatch.
    pub fn record(&self, kind: OperationKind, target: &Url, duration: Duration) {
        if !self.enabled {
            return;
        }
        let percent = self.sample_percent(duration);
        if percent < 100 && rand::thread_rng().gen_range(0..100) >= percent {
            return;
        }
        info!(
            operation = kind.as_str(),
            authority = target.host_str().unwrap_or_default(),
            path = target.path(),
            duration_ms = duration.as_millis() as u64,
            sample_percent = percent,
            "provider call sampled"
        );
    }
}
