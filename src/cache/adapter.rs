//! Fail-open cache store adapter
//!
//! Wraps a [`CacheBackend`] so that no cache failure ever reaches a caller.
//! Every backend call is bounded by the configured operation timeout; errors
//! and timeouts are logged and degrade to a miss (reads) or a no-op (writes).
//! Write-style methods return `true` when the backend confirmed the change so
//! that callers which must not lose information (the tag index) can react.

use crate::cache::backend::CacheBackend;
use crate::cache::config::CacheConfig;
use crate::cache::keys::build_key;
use crate::cache::types::{CacheKey, CacheValue, StatsRecorder};
use crate::error::{CacheError, CacheResult};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Best-effort view of a cache backend
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    operation_timeout: Duration,
    key_prefix: Option<String>,
    stats: Arc<StatsRecorder>,
}

impl CacheStore {
    /// Wrap a backend using the timeout and key prefix from the configuration
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        debug!(
            "Initializing cache store over {} backend (timeout {:?}, prefix {:?})",
            backend.name(),
            config.operation_timeout,
            config.key_prefix
        );

        Self {
            backend,
            operation_timeout: config.operation_timeout,
            key_prefix: config.key_prefix.clone(),
            stats: Arc::new(StatsRecorder::default()),
        }
    }

    pub(crate) fn stats(&self) -> &Arc<StatsRecorder> {
        &self.stats
    }

    /// Name of the wrapped backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Fetch a value; failures read as absent
    pub async fn get(&self, key: &str) -> Option<CacheValue> {
        let physical = self.physical(key);
        self.guarded("get", key, self.backend.get(&physical))
            .await
            .flatten()
    }

    /// Store a value
    pub async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> bool {
        let physical = self.physical(key);
        self.guarded("set", key, self.backend.set(&physical, value, ttl))
            .await
            .is_some()
    }

    /// Remove a value
    pub async fn delete(&self, key: &str) -> bool {
        let physical = self.physical(key);
        self.guarded("delete", key, self.backend.delete(&physical))
            .await
            .is_some()
    }

    /// Remove several values; an empty batch never reaches the backend
    pub async fn delete_many(&self, keys: &[CacheKey]) -> bool {
        if keys.is_empty() {
            return true;
        }

        let physical: Vec<CacheKey> = keys.iter().map(|k| self.physical(k)).collect();
        let label = format!("{} keys", keys.len());
        self.guarded("delete_many", &label, self.backend.delete_many(&physical))
            .await
            .is_some()
    }

    /// Add a member to a set
    pub async fn add_to_set(&self, set_key: &str, member: &str) -> bool {
        let physical = self.physical(set_key);
        self.guarded("add_to_set", set_key, self.backend.add_to_set(&physical, member))
            .await
            .is_some()
    }

    /// Members of a set; failures read as empty
    pub async fn members_of(&self, set_key: &str) -> HashSet<String> {
        let physical = self.physical(set_key);
        self.guarded("members_of", set_key, self.backend.members_of(&physical))
            .await
            .unwrap_or_default()
    }

    /// Remove one member from a set
    pub async fn remove_from_set(&self, set_key: &str, member: &str) -> bool {
        let physical = self.physical(set_key);
        self.guarded(
            "remove_from_set",
            set_key,
            self.backend.remove_from_set(&physical, member),
        )
        .await
        .is_some()
    }

    /// Remove a whole set
    pub async fn delete_set(&self, set_key: &str) -> bool {
        let physical = self.physical(set_key);
        self.guarded("delete_set", set_key, self.backend.delete_set(&physical))
            .await
            .is_some()
    }

    /// Increment a counter; failures read as 0
    pub async fn increment(&self, key: &str, by: i64) -> i64 {
        let physical = self.physical(key);
        self.guarded("increment", key, self.backend.increment(&physical, by))
            .await
            .unwrap_or(0)
    }

    /// Whether a value exists; failures read as false
    pub async fn exists(&self, key: &str) -> bool {
        let physical = self.physical(key);
        self.guarded("exists", key, self.backend.exists(&physical))
            .await
            .unwrap_or(false)
    }

    /// Like [`exists`](Self::exists) but `None` when the backend could not answer
    pub async fn probe(&self, key: &str) -> Option<bool> {
        let physical = self.physical(key);
        self.guarded("exists", key, self.backend.exists(&physical))
            .await
    }

    /// Remove everything from the backend
    pub async fn flush(&self) -> bool {
        self.guarded("flush", "*", self.backend.flush())
            .await
            .is_some()
    }

    fn physical(&self, key: &str) -> CacheKey {
        build_key(self.key_prefix.as_deref(), [key])
    }

    /// Run a backend call under the operation timeout, logging and
    /// swallowing any failure
    async fn guarded<T, F>(&self, operation: &str, key: &str, call: F) -> Option<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let error = match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => CacheError::TimeoutError {
                timeout_ms: self.operation_timeout.as_millis() as u64,
                operation: operation.to_string(),
            },
        };

        self.stats.failure();
        warn!("Cache {} failed for {}: {}", operation, key, error);
        None
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend.name())
            .field("operation_timeout", &self.operation_timeout)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryBackend;

    fn store_over(backend: Arc<InMemoryBackend>, config: CacheConfig) -> CacheStore {
        CacheStore::new(backend, &config)
    }

    #[tokio::test]
    async fn test_passthrough_when_healthy() {
        let backend = Arc::new(InMemoryBackend::new(CacheConfig::deterministic()));
        let store = store_over(backend.clone(), CacheConfig::deterministic());

        assert!(store.set("a", b"1".to_vec(), None).await);
        assert_eq!(store.get("a").await, Some(b"1".to_vec()));
        assert!(store.exists("a").await);
        assert_eq!(store.increment("hits", 2).await, 2);

        assert!(store.add_to_set("tag:x", "a").await);
        assert!(store.members_of("tag:x").await.contains("a"));
        assert!(store.delete_many(&["a".to_string()]).await);
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_failures_degrade_to_miss_or_noop() {
        let backend = Arc::new(InMemoryBackend::new(CacheConfig::deterministic()));
        let store = store_over(backend.clone(), CacheConfig::deterministic());
        store.set("a", b"1".to_vec(), None).await;
        store.add_to_set("tag:x", "a").await;

        backend.simulate_outage(true);

        assert!(store.get("a").await.is_none());
        assert!(store.members_of("tag:x").await.is_empty());
        assert!(!store.exists("a").await);
        assert_eq!(store.increment("hits", 1).await, 0);
        assert!(!store.set("b", b"2".to_vec(), None).await);
        assert!(!store.delete("a").await);
        assert!(!store.delete_many(&["a".to_string()]).await);
        assert!(store.stats().snapshot().failures >= 7);

        backend.simulate_outage(false);
        assert_eq!(store.get("a").await, Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let backend = Arc::new(
            InMemoryBackend::new(CacheConfig::deterministic())
                .with_latency(Duration::from_millis(200)),
        );
        let config = CacheConfig::builder()
            .operation_timeout(Duration::from_millis(20))
            .build();
        let store = store_over(backend, config);

        assert!(!store.set("a", b"1".to_vec(), None).await);
        assert!(store.get("a").await.is_none());
        assert_eq!(store.stats().snapshot().failures, 2);
    }

    #[tokio::test]
    async fn test_empty_delete_many_skips_backend() {
        let backend = Arc::new(InMemoryBackend::new(CacheConfig::deterministic()));
        backend.simulate_outage(true);
        let store = store_over(backend, CacheConfig::deterministic());

        assert!(store.delete_many(&[]).await);
        assert_eq!(store.stats().snapshot().failures, 0);
    }

    #[tokio::test]
    async fn test_key_prefix_is_applied() {
        let backend = Arc::new(InMemoryBackend::new(CacheConfig::deterministic()));
        let config = CacheConfig::builder().key_prefix("blue").build();
        let store = store_over(backend.clone(), config);

        store.set("user:id:1", b"x".to_vec(), None).await;
        assert!(backend.contains_key("blue:user:id:1").await);
        assert!(!backend.contains_key("user:id:1").await);
        assert_eq!(store.get("user:id:1").await, Some(b"x".to_vec()));
    }
}
