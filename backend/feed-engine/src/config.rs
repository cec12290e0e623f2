use serde::{Deserialize, Serialize};

/// Engine configuration
///
/// All values have production defaults; `from_env` overrides them from the
/// environment so deployments can tune TTLs without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Response cache TTL in seconds (full computed listing payloads)
    pub response_ttl_secs: u64,
    /// User entity cache TTL in seconds
    pub user_ttl_secs: u64,
    /// Post entity cache TTL in seconds
    pub post_ttl_secs: u64,
    /// Hard cap on any requested page size
    pub max_page_size: u64,
    /// Raw index ids fetched per pagination round, as a multiple of the limit
    pub page_window_multiplier: u64,
    /// Running-offset ceiling for the filtered global-index scan
    pub fallback_scan_ceiling: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_ttl_secs: 30,
            user_ttl_secs: 300,
            post_ttl_secs: 600,
            max_page_size: 100,
            page_window_multiplier: 2,
            fallback_scan_ceiling: 3000,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            response_ttl_secs: env_or("FEED_RESPONSE_TTL_SECS", defaults.response_ttl_secs),
            user_ttl_secs: env_or("FEED_USER_TTL_SECS", defaults.user_ttl_secs),
            post_ttl_secs: env_or("FEED_POST_TTL_SECS", defaults.post_ttl_secs),
            max_page_size: env_or("FEED_MAX_PAGE_SIZE", defaults.max_page_size),
            page_window_multiplier: env_or(
                "FEED_PAGE_WINDOW_MULTIPLIER",
                defaults.page_window_multiplier,
            ),
            fallback_scan_ceiling: env_or(
                "FEED_FALLBACK_SCAN_CEILING",
                defaults.fallback_scan_ceiling,
            ),
        }
    }
}

fn env_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
