//! Configuration for the resolver

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default MIME filter used when loading thumbnails.
pub const DEFAULT_THUMBNAIL_FILTER: &str = "image/*";

/// Configuration for a [`Resolver`](crate::Resolver).
///
/// None of these settings change the resilience contract (one recovery
/// attempt, exactly-once release); they only tune diagnostics and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Calls at least this slow are always sampled; faster calls are sampled
    /// proportionally to their duration.
    pub slow_call_threshold: Duration,

    /// Whether slow-call sampling is enabled at all
    pub sampling: bool,

    /// Whether dropping an unclosed result logs a leak warning
    pub leak_warnings: bool,

    /// MIME filter used by thumbnail loading
    pub thumbnail_mime_filter: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            slow_call_threshold: Duration::from_millis(500),
            sampling: true,
            leak_warnings: true,
            thumbnail_mime_filter: DEFAULT_THUMBNAIL_FILTER.to_string(),
        }
    }
}

impl ResolverConfig {
    /// Set the slow-call threshold.
    pub fn with_slow_call_threshold(mut self, threshold: Duration) -> Self {
        self.slow_call_threshold = threshold;
        self
    }

    /// Enable or disable slow-call sampling.
    pub fn with_sampling(mut self, enabled: bool) -> Self {
        self.sampling = enabled;
        self
    }

    /// Enable or disable leak warnings.
    pub fn with_leak_warnings(mut self, enabled: bool) -> Self {
        self.leak_warnings = enabled;
        self
    }

    /// Set the thumbnail MIME filter.
    pub fn with_thumbnail_mime_filter(mut self, filter: impl Into<String>) -> Self {
        self.thumbnail_mime_filter = filter.into();
        self
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    /// This will look for:
    /// - `PROVIDERLINK_SLOW_CALL_MS` for the slow-call threshold (milliseconds)
    /// - `PROVIDERLINK_SAMPLING` (`true`/`false`/`1`/`0`)
    /// - `PROVIDERLINK_LEAK_WARNINGS` (`true`/`false`/`1`/`0`)
    /// - `PROVIDERLINK_THUMBNAIL_FILTER` for the thumbnail MIME filter
    ///
    /// Unparseable values are ignored and the default is kept.
    #[cfg(feature = "env")]
    pub fn from_env() -> Self {
        use std::env;

        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(raw) = env::var("PROVIDERLINK_SLOW_CALL_MS")
            && let Ok(millis) = raw.parse::<u64>()
        {
            config.slow_call_threshold = Duration::from_millis(millis);
        }

        if let Ok(raw) = env::var("PROVIDERLINK_SAMPLING")
            && let Some(enabled) = parse_flag(&raw)
        {
            config.sampling = enabled;
        }

        if let Ok(raw) = env::var("PROVIDERLINK_LEAK_WARNINGS")
            && let Some(enabled) = parse_flag(&raw)
        {
            config.leak_warnings = enabled;
        }

        if let Ok(filter) = env::var("PROVIDERLINK_THUMBNAIL_FILTER")
            && !filter.is_empty()
        {
            config.thumbnail_mime_filter = filter;
        }

        config
    }
}

#[cfg(feature = "env")]
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.slow_call_threshold, Duration::from_millis(500));
        assert!(config.sampling);
        assert!(config.leak_warnings);
        assert_eq!(config.thumbnail_mime_filter, "image/*");
    }

    #[test]
    fn test_builder_setters() {
        let config = ResolverConfig::default()
            .with_slow_call_threshold(Duration::from_millis(50))
            .with_sampling(false)
            .with_leak_warnings(false)
            .with_thumbnail_mime_filter("image/webp");
        assert_eq!(config.slow_call_threshold, Duration::from_millis(50));
        assert!(!config.sampling);
        assert!(!config.leak_warnings);
        assert_eq!(config.thumbnail_mime_filter, "image/webp");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ResolverConfig = serde_json::from_str(r#"{"sampling": false}"#).unwrap();
        assert!(!config.sampling);
        assert_eq!(config.slow_call_threshold, Duration::from_millis(500));
    }

    #[cfg(feature = "env")]
    #[test]
    fn test_config_from_env_variables() {
        temp_env::with_vars(
            [
                ("PROVIDERLINK_SLOW_CALL_MS", Some("120")),
                ("PROVIDERLINK_SAMPLING", Some("off")),
                ("PROVIDERLINK_LEAK_WARNINGS", Some("0")),
                ("PROVIDERLINK_THUMBNAIL_FILTER", Some("image/png")),
            ],
            || {
                let config = ResolverConfig::from_env();
                assert_eq!(config.slow_call_threshold, Duration::from_millis(120));
                assert!(!config.sampling);
                assert!(!config.leak_warnings);
                assert_eq!(config.thumbnail_mime_filter, "image/png");
            },
        );
    }

    #[cfg(feature = "env")]
    #[test]
    fn test_config_from_env_ignores_garbage() {
        temp_env::with_vars(
            [
                ("PROVIDERLINK_SLOW_CALL_MS", Some("soon")),
                ("PROVIDERLINK_SAMPLING", Some("maybe")),
                ("PROVIDERLINK_LEAK_WARNINGS", None),
                ("PROVIDERLINK_THUMBNAIL_FILTER", None),
            ],
            || {
                let config = ResolverConfig::from_env();
                assert_eq!(config, ResolverConfig::default());
            },
        );
    }
}
