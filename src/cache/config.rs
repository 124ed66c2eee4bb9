//! Configuration for the cache system

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the Redis connection URL
pub const ENV_REDIS_URL: &str = "TAGREPO_REDIS_URL";
/// Environment variable holding the default TTL in seconds (`0` disables expiry)
pub const ENV_DEFAULT_TTL_SECS: &str = "TAGREPO_DEFAULT_TTL_SECS";
/// Environment variable holding the TTL jitter factor
pub const ENV_TTL_JITTER: &str = "TAGREPO_TTL_JITTER";
/// Environment variable holding the per-operation timeout in milliseconds
pub const ENV_OPERATION_TIMEOUT_MS: &str = "TAGREPO_OPERATION_TIMEOUT_MS";
/// Environment variable holding the global key prefix
pub const ENV_KEY_PREFIX: &str = "TAGREPO_KEY_PREFIX";

/// Configuration for the cache service and its store adapter
///
/// TTLs are meant to stay short relative to write frequency: they bound how
/// long a key that raced an invalidation can survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when a caller does not pass one. `None` stores without expiry.
    pub default_ttl: Option<Duration>,

    /// TTL jitter factor (0.0 - 1.0) applied to the default TTL
    /// Spreads expiry of entries written together
    pub ttl_jitter: f64,

    /// Upper bound for a single cache store call before it is treated as failed
    pub operation_timeout: Duration,

    /// Prefix prepended to every physical key, for sharing one store between deployments
    pub key_prefix: Option<String>,

    /// Redis connection URL. `None` selects the in-memory backend.
    pub redis_url: Option<String>,

    /// Maximum number of entries held by the in-memory backend
    pub max_entries: usize,

    /// Enable periodic cleanup of expired entries in the in-memory backend
    pub enable_auto_cleanup: bool,

    /// Interval for automatic cleanup checks
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 1 hour default TTL
            default_ttl: Some(Duration::from_secs(3600)),
            ttl_jitter: 0.1,
            operation_timeout: Duration::from_millis(500),
            key_prefix: None,
            redis_url: None,
            max_entries: 10_000,
            enable_auto_cleanup: true,
            // Cleanup every 5 minutes
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        if self.ttl_jitter < 0.0 || self.ttl_jitter > 1.0 {
            return Err("ttl_jitter must be between 0.0 and 1.0".to_string());
        }

        if self.operation_timeout.is_zero() {
            return Err("operation_timeout must be greater than 0".to_string());
        }

        if matches!(self.default_ttl, Some(ttl) if ttl.is_zero()) {
            return Err("default_ttl must be greater than 0 when set".to_string());
        }

        if matches!(&self.key_prefix, Some(prefix) if prefix.is_empty()) {
            return Err("key_prefix must not be empty when set".to_string());
        }

        Ok(())
    }

    /// Resolve the TTL for a write: an explicit TTL wins, otherwise the
    /// default TTL with jitter applied
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Option<Duration> {
        match requested {
            Some(ttl) => Some(ttl),
            None => self.default_ttl.map(|ttl| self.ttl_with_jitter(ttl)),
        }
    }

    /// Calculate actual TTL with jitter applied
    pub fn ttl_with_jitter(&self, base: Duration) -> Duration {
        if self.ttl_jitter == 0.0 {
            return base;
        }

        let base_secs = base.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(1.0);

        Duration::from_secs_f64(final_secs)
    }

    /// Load configuration from the environment, reading a `.env` file first if present
    ///
    /// Unset variables keep their default values.
    pub fn from_env() -> CacheResult<Self> {
        if let Ok(path) = dotenv::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_REDIS_URL) {
            if !url.trim().is_empty() {
                config.redis_url = Some(url);
            }
        }

        if let Ok(raw) = std::env::var(ENV_DEFAULT_TTL_SECS) {
            let secs: u64 = parse_env(ENV_DEFAULT_TTL_SECS, &raw)?;
            config.default_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Ok(raw) = std::env::var(ENV_TTL_JITTER) {
            config.ttl_jitter = parse_env(ENV_TTL_JITTER, &raw)?;
        }

        if let Ok(raw) = std::env::var(ENV_OPERATION_TIMEOUT_MS) {
            let millis: u64 = parse_env(ENV_OPERATION_TIMEOUT_MS, &raw)?;
            config.operation_timeout = Duration::from_millis(millis);
        }

        if let Ok(prefix) = std::env::var(ENV_KEY_PREFIX) {
            if !prefix.trim().is_empty() {
                config.key_prefix = Some(prefix);
            }
        }

        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> CacheResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| CacheError::ConfigError(format!("invalid value for {}: {:?}", name, raw)))
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    default_ttl: Option<Option<Duration>>,
    ttl_jitter: Option<f64>,
    operation_timeout: Option<Duration>,
    key_prefix: Option<String>,
    redis_url: Option<String>,
    max_entries: Option<usize>,
    enable_auto_cleanup: Option<bool>,
    cleanup_interval: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Set default TTL for cache entries
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(Some(ttl));
        self
    }

    /// Store entries without expiry unless a caller passes a TTL
    pub fn no_default_ttl(mut self) -> Self {
        self.default_ttl = Some(None);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Set the per-operation timeout
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Set the global key prefix
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the Redis connection URL
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Set maximum number of in-memory entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Enable or disable automatic cleanup
    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.enable_auto_cleanup = Some(enable);
        self
    }

    /// Set cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            operation_timeout: self.operation_timeout.unwrap_or(defaults.operation_timeout),
            key_prefix: self.key_prefix.or(defaults.key_prefix),
            redis_url: self.redis_url.or(defaults.redis_url),
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            enable_auto_cleanup: self
                .enable_auto_cleanup
                .unwrap_or(defaults.enable_auto_cleanup),
            cleanup_interval: self.cleanup_interval.unwrap_or(defaults.cleanup_interval),
        }
    }
}

/// Preset configurations for common use cases
impl CacheConfig {
    /// Configuration for frequently written data (short TTL)
    pub fn realtime() -> Self {
        Self {
            default_ttl: Some(Duration::from_secs(300)), // 5 minutes
            ttl_jitter: 0.15,
            operation_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    /// Configuration for rarely changing reference data (long TTL)
    pub fn static_content() -> Self {
        Self {
            default_ttl: Some(Duration::from_secs(24 * 3600)), // 24 hours
            ttl_jitter: 0.05,
            max_entries: 100_000,
            ..Default::default()
        }
    }

    /// Deterministic configuration: no default expiry, no jitter, no cleanup task
    pub fn deterministic() -> Self {
        Self {
            default_ttl: None,
            ttl_jitter: 0.0,
            enable_auto_cleanup: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.max_entries, 10_000);
        assert!(config.redis_url.is_none());
        assert!(config.enable_auto_cleanup);
    }

    #[test]
    fn test_config_validation() {
        let valid_config = CacheConfig::default();
        assert!(valid_config.validate().is_ok());

        let mut invalid_config = CacheConfig::default();
        invalid_config.max_entries = 0;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.ttl_jitter = 1.5;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.operation_timeout = Duration::ZERO;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.key_prefix = Some(String::new());
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .default_ttl(Duration::from_secs(600))
            .operation_timeout(Duration::from_millis(50))
            .key_prefix("staging")
            .max_entries(5000)
            .build();

        assert_eq!(config.default_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.operation_timeout, Duration::from_millis(50));
        assert_eq!(config.key_prefix.as_deref(), Some("staging"));
        assert_eq!(config.max_entries, 5000);

        let config = CacheConfig::builder().no_default_ttl().build();
        assert_eq!(config.default_ttl, None);
    }

    #[test]
    fn test_ttl_with_jitter() {
        let config = CacheConfig {
            ttl_jitter: 0.1,
            ..Default::default()
        };

        let ttl = config.ttl_with_jitter(Duration::from_secs(3600));
        let base_secs = 3600.0;
        let jitter_range = base_secs * 0.1;

        assert!(ttl.as_secs_f64() >= base_secs - jitter_range);
        assert!(ttl.as_secs_f64() <= base_secs + jitter_range);
    }

    #[test]
    fn test_effective_ttl() {
        let config = CacheConfig::builder()
            .default_ttl(Duration::from_secs(120))
            .ttl_jitter(0.0)
            .build();

        // An explicit TTL is used as-is
        assert_eq!(
            config.effective_ttl(Some(Duration::from_secs(5))),
            Some(Duration::from_secs(5))
        );
        assert_eq!(config.effective_ttl(None), Some(Duration::from_secs(120)));

        let config = CacheConfig::deterministic();
        assert_eq!(config.effective_ttl(None), None);
    }

    #[test]
    fn test_preset_configs() {
        let realtime = CacheConfig::realtime();
        assert_eq!(realtime.default_ttl, Some(Duration::from_secs(300)));

        let static_content = CacheConfig::static_content();
        assert_eq!(static_content.default_ttl, Some(Duration::from_secs(24 * 3600)));

        let deterministic = CacheConfig::deterministic();
        assert!(deterministic.validate().is_ok());
        assert!(!deterministic.enable_auto_cleanup);
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(ENV_DEFAULT_TTL_SECS, "90");
        std::env::set_var(ENV_OPERATION_TIMEOUT_MS, "125");
        std::env::set_var(ENV_KEY_PREFIX, "tenant-a");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.default_ttl, Some(Duration::from_secs(90)));
        assert_eq!(config.operation_timeout, Duration::from_millis(125));
        assert_eq!(config.key_prefix.as_deref(), Some("tenant-a"));

        std::env::set_var(ENV_OPERATION_TIMEOUT_MS, "soon");
        let result = CacheConfig::from_env();
        assert!(matches!(result, Err(CacheError::ConfigError(_))));

        std::env::remove_var(ENV_DEFAULT_TTL_SECS);
        std::env::remove_var(ENV_OPERATION_TIMEOUT_MS);
        std::env::remove_var(ENV_KEY_PREFIX);
    }
}
