//! Cache-aside service
//!
//! The public face of the cache layer: typed `get`/`set` over JSON-encoded
//! values, `remember` for read-through population, and tag invalidation.
//! Nothing here returns a cache error; a broken cache store behaves like an
//! empty one.

use crate::cache::{
    adapter::CacheStore,
    backend::CacheBackend,
    config::CacheConfig,
    invalidation::{InvalidationEvent, InvalidationReason},
    memory::InMemoryBackend,
    redis::RedisBackend,
    tags::TagIndex,
    types::{CacheKey, CacheStats, Tag},
};
use crate::error::{CacheError, CacheResult};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-write cache options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Explicit TTL; the configured default applies when absent
    pub ttl: Option<Duration>,

    /// Tags the written key is filed under
    pub tags: Vec<Tag>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying the given tags
    pub fn tagged<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Tag>,
    {
        Self::default().with_tags(tags)
    }

    /// Set an explicit TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Add one tag
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    /// Add several tags
    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Tag>,
    {
        tags.into_iter().fold(self, |options, tag| options.with_tag(tag))
    }
}

/// What to drop from the cache after a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eviction {
    /// Named keys only
    Keys(Vec<CacheKey>),

    /// Every key filed under the tags
    Tags(Vec<Tag>),

    /// The whole cache store
    AllEntries,
}

impl Eviction {
    /// Pick one target from loosely specified parts.
    ///
    /// `all_entries` wins over tags, and tags win over a key. `None` when
    /// nothing was named.
    pub fn resolve(key: Option<CacheKey>, tags: Vec<Tag>, all_entries: bool) -> Option<Self> {
        if all_entries {
            Some(Eviction::AllEntries)
        } else if !tags.is_empty() {
            Some(Eviction::Tags(tags))
        } else {
            key.map(|key| Eviction::Keys(vec![key]))
        }
    }
}

/// Tag-aware cache-aside service
#[derive(Debug, Clone)]
pub struct CacheService {
    store: Arc<CacheStore>,
    tags: TagIndex,
    config: Arc<CacheConfig>,
}

impl CacheService {
    /// Build a service over an existing backend
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        let store = Arc::new(CacheStore::new(backend, &config));
        Self {
            tags: TagIndex::new(store.clone()),
            store,
            config: Arc::new(config),
        }
    }

    /// Build a service over a fresh in-memory backend
    pub fn in_memory(config: CacheConfig) -> Self {
        let backend = Arc::new(InMemoryBackend::new(config.clone()));
        Self::new(backend, config)
    }

    /// Validate the configuration and connect the backend it names
    ///
    /// Redis when `redis_url` is set, otherwise in-memory with the periodic
    /// cleanup task started if enabled. Must be called inside a Tokio runtime.
    pub async fn connect(config: CacheConfig) -> CacheResult<Self> {
        config.validate().map_err(CacheError::ConfigError)?;

        match config.redis_url.clone() {
            Some(url) => {
                let backend = RedisBackend::connect(&url).await?;
                Ok(Self::new(Arc::new(backend), config))
            }
            None => {
                info!("No Redis URL configured, using in-memory cache backend");
                let backend = Arc::new(InMemoryBackend::new(config.clone()));
                InMemoryBackend::spawn_cleanup(backend.clone());
                Ok(Self::new(backend, config))
            }
        }
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The fail-open store adapter underneath
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// The tag index underneath
    pub fn tag_index(&self) -> &TagIndex {
        &self.tags
    }

    /// Fetch and decode a value; undecodable entries read as absent
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let stats = self.store.stats();

        let Some(bytes) = self.store.get(key).await else {
            debug!("Cache miss: {}", key);
            stats.miss();
            return None;
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!("Cache hit: {}", key);
                stats.hit();
                Some(value)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                stats.miss();
                None
            }
        }
    }

    /// Encode and store a value, then file it under the option tags
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: &CacheOptions) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Not caching {}: {}", key, CacheError::from(e));
                return;
            }
        };

        let ttl = self.config.effective_ttl(options.ttl);
        if self.store.set(key, bytes, ttl).await {
            self.store.stats().set();
        }

        // A timed-out set may still have landed, so it is filed regardless
        self.tags.associate(key, &options.tags).await;
    }

    /// Return the cached value, or produce, cache and return it
    ///
    /// Concurrent callers missing the same key each run the producer.
    /// Producer errors propagate and nothing is cached.
    pub async fn remember<T, E, F, Fut>(
        &self,
        key: &str,
        options: &CacheOptions,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = producer().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    /// Run `operation`, then evict on success. Errors propagate and nothing
    /// is evicted.
    pub async fn evict_after<T, E, F, Fut>(&self, eviction: &Eviction, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let result = operation().await?;
        self.evict(eviction).await;
        Ok(result)
    }

    /// Drop the targeted entries. Returns what the store confirmed removed.
    pub async fn evict(&self, eviction: &Eviction) -> Vec<InvalidationEvent> {
        match eviction {
            Eviction::Keys(keys) if keys.is_empty() => Vec::new(),
            Eviction::Keys(keys) => {
                if !self.store.delete_many(keys).await {
                    return Vec::new();
                }
                debug!("Evicted {} keys", keys.len());
                vec![InvalidationEvent::new(InvalidationReason::Manual, keys.clone())]
            }
            Eviction::Tags(tags) => self.invalidate_tags(tags).await,
            Eviction::AllEntries => {
                if !self.store.flush().await {
                    return Vec::new();
                }
                info!("Flushed {} cache store", self.store.backend_name());
                vec![InvalidationEvent::new(InvalidationReason::Manual, Vec::new())
                    .with_context("all entries")]
            }
        }
    }

    /// Remove every key filed under the tags
    pub async fn invalidate_tags(&self, tags: &[Tag]) -> Vec<InvalidationEvent> {
        if tags.is_empty() {
            return Vec::new();
        }
        self.tags.invalidate(tags).await
    }

    /// Remove one key
    pub async fn delete(&self, key: &str) {
        self.store.delete(key).await;
    }

    /// Remove several keys
    pub async fn delete_many(&self, keys: &[CacheKey]) {
        self.store.delete_many(keys).await;
    }

    /// Add `by` to a counter; reads as 0 when the store is unavailable
    pub async fn increment(&self, key: &str, by: i64) -> i64 {
        self.store.increment(key, by).await
    }

    /// Whether a value is cached under the key
    pub async fn exists(&self, key: &str) -> bool {
        self.store.exists(key).await
    }

    /// Drop everything from the cache store
    pub async fn flush(&self) {
        self.evict(&Eviction::AllEntries).await;
    }

    /// Drop tag members whose values are gone; one event per tag that lost members
    pub async fn prune_tags(&self, tags: &[Tag]) -> Vec<InvalidationEvent> {
        let mut events = Vec::new();
        for tag in tags {
            events.extend(self.tags.prune(tag).await);
        }
        events
    }

    /// Snapshot of the service counters
    pub fn stats(&self) -> CacheStats {
        self.store.stats().snapshot()
    }
}
