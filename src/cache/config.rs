//! Cache configuration.
//!
//! Controls the response cache via `corvid.toml`.

use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_FEED_TTL_SECONDS: u64 = 60;
const DEFAULT_AUTHOR_TTL_SECONDS: u64 = 120;
const DEFAULT_PROFILE_TTL_SECONDS: u64 = 300;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Cache configuration from `corvid.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache.
    pub enabled: bool,
    /// Fallback TTL (seconds) when a call site does not pick one. Zero is
    /// treated as this default; entries always expire.
    pub default_ttl_seconds: u64,
    /// TTL for the shared feeds (all posts, following feed).
    pub feed_ttl_seconds: u64,
    /// TTL for per-author feeds and single-post views.
    pub author_ttl_seconds: u64,
    /// TTL for profiles and suggested users.
    pub profile_ttl_seconds: u64,
    /// Cadence of the background sweep that purges expired entries.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            feed_ttl_seconds: DEFAULT_FEED_TTL_SECONDS,
            author_ttl_seconds: DEFAULT_AUTHOR_TTL_SECONDS,
            profile_ttl_seconds: DEFAULT_PROFILE_TTL_SECONDS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl_seconds: settings.default_ttl_seconds,
            feed_ttl_seconds: settings.feed_ttl_seconds,
            author_ttl_seconds: settings.author_ttl_seconds,
            profile_ttl_seconds: settings.profile_ttl_seconds,
            sweep_interval_ms: settings.sweep_interval_ms,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        non_zero_secs(self.default_ttl_seconds, DEFAULT_TTL_SECONDS)
    }

    pub fn feed_ttl(&self) -> Duration {
        non_zero_secs(self.feed_ttl_seconds, DEFAULT_FEED_TTL_SECONDS)
    }

    pub fn author_ttl(&self) -> Duration {
        non_zero_secs(self.author_ttl_seconds, DEFAULT_AUTHOR_TTL_SECONDS)
    }

    pub fn profile_ttl(&self) -> Duration {
        non_zero_secs(self.profile_ttl_seconds, DEFAULT_PROFILE_TTL_SECONDS)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

fn non_zero_secs(value: u64, fallback: u64) -> Duration {
    if value == 0 {
        Duration::from_secs(fallback)
    } else {
        Duration::from_secs(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.feed_ttl(), Duration::from_secs(60));
        assert_eq!(config.author_ttl(), Duration::from_secs(120));
        assert_eq!(config.profile_ttl(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval(), Duration::from_millis(60_000));
    }

    #[test]
    fn zero_ttl_falls_back_to_default() {
        let config = CacheConfig {
            feed_ttl_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.feed_ttl(), Duration::from_secs(60));
    }
}
