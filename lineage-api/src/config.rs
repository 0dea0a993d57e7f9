//! API Configuration Module
//!
//! Configuration for the HTTP surface and the tunable knobs of the data
//! access layer (cache TTL/capacity, loader debounce window). Loaded from
//! environment variables with sensible defaults for development.

use std::time::Duration;

use lineage_storage::{DEFAULT_BATCH_DELAY, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for CORS and data-access tuning.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Time-to-live for entries in the query result cache.
    pub cache_ttl: Duration,

    /// Maximum number of entries in the query result cache.
    pub cache_capacity: usize,

    /// Debounce window for the batch loaders.
    pub batch_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(), // Empty = allow all
            cors_max_age_secs: 86400, // 24 hours
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `LINEAGE_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `LINEAGE_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `LINEAGE_CACHE_TTL_SECS`: Query cache TTL in seconds (default: 300)
    /// - `LINEAGE_CACHE_CAPACITY`: Query cache entry limit (default: 1000)
    /// - `LINEAGE_BATCH_DELAY_MICROS`: Loader debounce window (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = std::env::var("LINEAGE_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("LINEAGE_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let cache_ttl = std::env::var("LINEAGE_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let cache_capacity = std::env::var("LINEAGE_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cache_capacity);

        let batch_delay = std::env::var("LINEAGE_BATCH_DELAY_MICROS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_micros)
            .unwrap_or(defaults.batch_delay);

        Self {
            cors_origins,
            cors_max_age_secs,
            cache_ttl,
            cache_capacity,
            batch_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.batch_delay, Duration::from_millis(1));
    }
}
