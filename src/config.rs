//! Request and cache configuration
//!
//! An explicit configuration struct constructed in `main` and injected into
//! the service, so tests can build isolated instances with short intervals.

use std::collections::HashMap;
use std::time::Duration;

/// Default per-attempt request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Minimum interval between new top-level requests for the same source
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);
/// Default cache entry lifetime
const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
/// Default page size for hot lists
const DEFAULT_PAGE_SIZE: usize = 50;

/// Tunables consumed by the fetch/cache core.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Per-attempt timeout applied when a source has no override
    pub request_timeout: Duration,
    /// Minimum inter-request interval for the local throttle
    pub min_request_interval: Duration,
    /// Cache TTL applied when a source has no override
    pub default_ttl: Duration,
    /// Page size used when the caller does not specify one
    pub default_page_size: usize,
    /// Per-source timeout overrides, keyed by source id
    pub source_timeouts: HashMap<String, Duration>,
    /// Per-source TTL overrides, keyed by source id
    pub source_ttls: HashMap<String, Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let mut source_timeouts = HashMap::new();
        // The book ranking goes through CORS proxies and needs far longer;
        // the museum APIs are slow but direct.
        source_timeouts.insert("zhuishu".to_string(), Duration::from_secs(20));
        source_timeouts.insert("metmuseum".to_string(), Duration::from_secs(15));
        source_timeouts.insert("artic".to_string(), Duration::from_secs(10));

        Self {
            request_timeout: DEFAULT_TIMEOUT,
            min_request_interval: DEFAULT_MIN_INTERVAL,
            default_ttl: DEFAULT_TTL,
            default_page_size: DEFAULT_PAGE_SIZE,
            source_timeouts,
            source_ttls: HashMap::new(),
        }
    }
}

impl ApiConfig {
    /// Per-attempt timeout for the given source.
    pub fn timeout_for(&self, source_id: &str) -> Duration {
        self.source_timeouts
            .get(source_id)
            .copied()
            .unwrap_or(self.request_timeout)
    }

    /// Cache TTL for the given source.
    pub fn ttl_for(&self, source_id: &str) -> Duration {
        self.source_ttls
            .get(source_id)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ApiConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.min_request_interval, Duration::from_millis(500));
        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_timeout_overrides() {
        let config = ApiConfig::default();
        assert_eq!(config.timeout_for("zhuishu"), Duration::from_secs(20));
        assert_eq!(config.timeout_for("metmuseum"), Duration::from_secs(15));
        assert_eq!(config.timeout_for("artic"), Duration::from_secs(10));
        assert_eq!(config.timeout_for("weibo"), Duration::from_secs(5));
    }

    #[test]
    fn test_ttl_override() {
        let mut config = ApiConfig::default();
        config
            .source_ttls
            .insert("weibo".to_string(), Duration::from_secs(120));
        assert_eq!(config.ttl_for("weibo"), Duration::from_secs(120));
        assert_eq!(config.ttl_for("zhihu"), Duration::from_secs(3600));
    }
}
