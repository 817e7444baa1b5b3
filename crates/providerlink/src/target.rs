//! Target identifiers.

use crate::error::{Error, Result};
use url::Url;

/// Scheme of targets served by provider endpoints.
pub const SCHEME_CONTENT: &str = "content";

/// Scheme of targets opened directly from the local filesystem.
pub const SCHEME_FILE: &str = "file";

/// Authority of a provider target, e.g. `com.example.notes` for
/// `content://com.example.notes/items/3`.
pub fn authority(target: &Url) -> Result<&str> {
    match target.host_str() {
        Some(host) if !host.is_empty() => Ok(host),
        _ => Err(Error::InvalidTarget(format!("{target} has no authority"))),
    }
}

/// Whether `target` is served by a provider endpoint.
pub fn is_provider_target(target: &Url) -> bool {
    target.scheme() == SCHEME_CONTENT
}

/// Target naming a whole provider, `content://{authority}`.
///
/// Batch and call operations address a provider rather than a resource.
pub fn provider_root(authority: &str) -> Result<Url> {
    let url = Url::parse(&format!("{SCHEME_CONTENT}://{authority}"))
        .map_err(|err| Error::InvalidTarget(format!("{authority}: {err}")))?;
    self::authority(&url)?;
    Ok(url)
}
