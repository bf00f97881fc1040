use config::{CacheConfig, MIN_REFRESH_INTERVAL_SECONDS};
use std::time::Duration;

/// Runtime settings of one entity cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    /// Period of the stale-entry check, never below ten seconds
    pub refresh_interval: Duration,
    /// Deadline for every request answered by the cache actor
    pub request_timeout: Duration,
    /// Associations loaded together with each cached entity
    pub includes: String,
}

impl CacheOptions {
    pub fn new(refresh_interval: Duration, request_timeout: Duration, includes: impl Into<String>) -> Self {
        Self {
            refresh_interval: refresh_interval.max(Duration::from_secs(MIN_REFRESH_INTERVAL_SECONDS)),
            request_timeout,
            includes: includes.into(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::from_secs(config.refresh_interval_seconds),
            Duration::from_secs(config.request_timeout_seconds),
            config.includes.clone(),
        )
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_interval_is_clamped() {
        let options = CacheOptions::new(Duration::from_secs(1), Duration::from_secs(5), "*");
        assert_eq!(options.refresh_interval, Duration::from_secs(10));
        assert_eq!(options.includes, "*");
    }

    #[test]
    fn test_defaults_follow_config() {
        let options = CacheOptions::default();
        assert_eq!(options.refresh_interval, Duration::from_secs(60));
        assert_eq!(options.request_timeout, Duration::from_secs(30));
        assert!(options.includes.is_empty());
    }
}
