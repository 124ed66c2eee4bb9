//! In-process cache backend with TTL expiry and LRU eviction
//!
//! Used for tests, single-node deployments, and as the fallback when no Redis
//! URL is configured. Fault injection (`simulate_outage`, `with_latency`)
//! lets callers exercise the fail-open paths of the store adapter.

use crate::cache::{
    backend::CacheBackend,
    config::CacheConfig,
    entry::CacheEntry,
    invalidation::{InvalidationEvent, InvalidationReason},
    types::{CacheKey, CacheValue},
};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// In-memory implementation of [`CacheBackend`]
pub struct InMemoryBackend {
    config: CacheConfig,
    state: Arc<RwLock<MemoryState>>,
    unavailable: AtomicBool,
    latency: Option<Duration>,
}

/// Internal storage
struct MemoryState {
    /// Values in recency order, bounded by `max_entries`
    entries: LruCache<CacheKey, CacheEntry>,

    /// Sets: set key -> members
    sets: HashMap<CacheKey, HashSet<String>>,

    /// Total size of cached data in bytes
    current_size_bytes: usize,
}

impl MemoryState {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            sets: HashMap::new(),
            current_size_bytes: 0,
        }
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.current_size_bytes = self
            .current_size_bytes
            .saturating_sub(entry.metadata.size_bytes);
        Some(entry)
    }

    /// Store as most recently used, evicting the least recently used at capacity
    fn insert_entry(&mut self, entry: CacheEntry) {
        let key = entry.key.clone();
        self.remove_entry(&key);

        self.current_size_bytes += entry.metadata.size_bytes;
        if let Some((evicted_key, evicted)) = self.entries.push(key, entry) {
            debug!("Evicting entry due to max_entries limit: {}", evicted_key);
            self.current_size_bytes = self
                .current_size_bytes
                .saturating_sub(evicted.metadata.size_bytes);
        }
    }

    /// Drop the entry if it expired; true when a live entry remains.
    /// Does not change recency.
    fn purge_expired(&mut self, key: &str) -> bool {
        match self.entries.peek(key) {
            Some(entry) if entry.is_expired() => {
                debug!("Cache entry expired: {}", key);
                self.remove_entry(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.sets.clear();
        self.current_size_bytes = 0;
    }
}

impl InMemoryBackend {
    /// Create a new backend bounded by `config.max_entries`
    pub fn new(config: CacheConfig) -> Self {
        info!(
            "Initializing in-memory cache backend (max_entries: {})",
            config.max_entries
        );

        Self {
            state: Arc::new(RwLock::new(MemoryState::new(config.max_entries))),
            config,
            unavailable: AtomicBool::new(false),
            latency: None,
        }
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every call fail with a connection error until switched off
    pub fn simulate_outage(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Whether a live value exists, bypassing fault injection
    pub async fn contains_key(&self, key: &str) -> bool {
        let state = self.state.read().await;
        state.entries.peek(key).is_some_and(|e| !e.is_expired())
    }

    /// Number of stored values, including not yet collected expired ones
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Check if no values are stored
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Number of members in a set, bypassing fault injection
    pub async fn set_len(&self, set_key: &str) -> usize {
        let state = self.state.read().await;
        state.sets.get(set_key).map_or(0, HashSet::len)
    }

    /// Current approximate size of stored values in bytes
    pub async fn size_bytes(&self) -> usize {
        self.state.read().await.current_size_bytes
    }

    /// Remove all expired entries
    pub async fn cleanup_expired(&self) -> Vec<InvalidationEvent> {
        let mut state = self.state.write().await;

        let expired_keys: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        if expired_keys.is_empty() {
            return Vec::new();
        }

        for key in &expired_keys {
            state.remove_entry(key);
        }

        debug!("Cleaned up {} expired entries", expired_keys.len());
        let context = format!("Cleaned up {} expired entries", expired_keys.len());
        vec![InvalidationEvent::new(InvalidationReason::Expired, expired_keys).with_context(context)]
    }

    /// Spawn the periodic cleanup task when enabled in the configuration
    pub fn spawn_cleanup(backend: Arc<Self>) -> Option<JoinHandle<()>> {
        if !backend.config.enable_auto_cleanup {
            return None;
        }

        let interval = backend.config.cleanup_interval;
        info!("Starting automatic cache cleanup task (interval: {:?})", interval);

        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let events = backend.cleanup_expired().await;
                if !events.is_empty() {
                    debug!("Auto cleanup: {} events", events.len());
                }
            }
        }))
    }

    async fn ready(&self, operation: &str) -> CacheResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionError(format!(
                "in-memory backend unavailable during {}",
                operation
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        self.ready("get").await?;
        let mut state = self.state.write().await;

        if !state.purge_expired(key) {
            return Ok(None);
        }
        Ok(state.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> CacheResult<()> {
        self.ready("set").await?;
        let mut state = self.state.write().await;

        state.insert_entry(CacheEntry::new(key.to_string(), value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.ready("delete").await?;
        let mut state = self.state.write().await;
        state.remove_entry(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[CacheKey]) -> CacheResult<()> {
        self.ready("delete_many").await?;
        let mut state = self.state.write().await;
        for key in keys {
            state.remove_entry(key);
        }
        Ok(())
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
        self.ready("add_to_set").await?;
        let mut state = self.state.write().await;
        state
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn members_of(&self, set_key: &str) -> CacheResult<HashSet<String>> {
        self.ready("members_of").await?;
        let state = self.state.read().await;
        Ok(state.sets.get(set_key).cloned().unwrap_or_default())
    }

    async fn remove_from_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
        self.ready("remove_from_set").await?;
        let mut state = self.state.write().await;
        if let Some(members) = state.sets.get_mut(set_key) {
            members.remove(member);
            if members.is_empty() {
                state.sets.remove(set_key);
            }
        }
        Ok(())
    }

    async fn delete_set(&self, set_key: &str) -> CacheResult<()> {
        self.ready("delete_set").await?;
        let mut state = self.state.write().await;
        state.sets.remove(set_key);
        Ok(())
    }

    async fn increment(&self, key: &str, by: i64) -> CacheResult<i64> {
        self.ready("increment").await?;
        let mut state = self.state.write().await;

        let existing = if state.purge_expired(key) {
            state.entries.peek(key)
        } else {
            None
        };
        let (current, ttl) = match existing {
            Some(entry) => {
                let raw = std::str::from_utf8(&entry.value).unwrap_or_default();
                let current: i64 = raw.parse().map_err(|_| {
                    CacheError::Other(format!("value at {} is not an integer", key))
                })?;
                (current, entry.time_until_expiration())
            }
            None => (0, None),
        };

        let next = current
            .checked_add(by)
            .ok_or_else(|| CacheError::Other(format!("increment overflow at {}", key)))?;

        // Re-inserted so size accounting and recency follow the new value
        state.insert_entry(CacheEntry::new(
            key.to_string(),
            next.to_string().into_bytes(),
            ttl,
        ));

        Ok(next)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.ready("exists").await?;
        let mut state = self.state.write().await;
        Ok(state.purge_expired(key))
    }

    async fn flush(&self) -> CacheResult<()> {
        self.ready("flush").await?;
        let mut state = self.state.write().await;

        let count = state.entries.len();
        state.clear();

        info!("Flushed {} entries from in-memory cache", count);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
