//! Tag index: tag -> set of cache keys
//!
//! A key is listed under a tag from the moment it is `set` with that tag
//! until the tag is invalidated. Listed keys may already have expired; the
//! index is eventually consistent and deleting an absent key is harmless.
//!
//! A `set` that races an invalidation (after the member read, before its own
//! key is added) survives the invalidation. Short TTLs bound that window.

use crate::cache::adapter::CacheStore;
use crate::cache::invalidation::{InvalidationEvent, InvalidationReason};
use crate::cache::types::{CacheKey, Tag};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of the set holding a tag's members
pub const TAG_PREFIX: &str = "tag:";

/// Storage key of a tag's member set: `"tag:" + tag`
pub fn tag_key(tag: &str) -> CacheKey {
    format!("{}{}", TAG_PREFIX, tag)
}

/// Reverse index from tags to the cache keys filed under them
#[derive(Debug, Clone)]
pub struct TagIndex {
    store: Arc<CacheStore>,
}

impl TagIndex {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// File `key` under every tag
    pub async fn associate(&self, key: &str, tags: &[Tag]) {
        for tag in tags {
            if !self.store.add_to_set(&tag_key(tag), key).await {
                debug!("Key {} not filed under tag {}", key, tag);
            }
        }
    }

    /// Delete every key filed under each tag, then the tag sets themselves
    ///
    /// Tags are processed independently; a failure on one tag does not stop
    /// the rest. When the key deletion fails the tag set is kept so a later
    /// invalidation can retry. Returns one event per tag whose keys were removed.
    pub async fn invalidate(&self, tags: &[Tag]) -> Vec<InvalidationEvent> {
        let mut events = Vec::new();

        for tag in tags {
            let set_key = tag_key(tag);

            let mut members: Vec<CacheKey> = self.store.members_of(&set_key).await.into_iter().collect();
            if members.is_empty() {
                debug!("No cached keys under tag: {}", tag);
                continue;
            }
            members.sort();

            if !self.store.delete_many(&members).await {
                warn!(
                    "Keeping tag set for {} after failing to delete {} keys",
                    tag,
                    members.len()
                );
                continue;
            }

            self.store.delete_set(&set_key).await;
            self.store.stats().tag_invalidated(members.len());
            debug!("Invalidated {} entries with tag: {}", members.len(), tag);

            events.push(InvalidationEvent::new(
                InvalidationReason::TagMatch { tag: tag.clone() },
                members,
            ));
        }

        if events.len() > 1 {
            let keys: usize = events.iter().map(|e| e.keys.len()).sum();
            info!("Invalidated {} entries across {} tags", keys, events.len());
        }

        events
    }

    /// Keys currently filed under a tag
    pub async fn members(&self, tag: &str) -> HashSet<String> {
        self.store.members_of(&tag_key(tag)).await
    }

    /// Drop members whose value no longer exists (expired or deleted)
    ///
    /// Only members the backend confirms absent are removed. Returns an
    /// event listing the dropped members, or `None` when nothing was dropped.
    pub async fn prune(&self, tag: &str) -> Option<InvalidationEvent> {
        let set_key = tag_key(tag);
        let members = self.store.members_of(&set_key).await;

        let mut pruned = Vec::new();
        for member in members {
            if self.store.probe(&member).await == Some(false)
                && self.store.remove_from_set(&set_key, &member).await
            {
                pruned.push(member);
            }
        }

        if pruned.is_empty() {
            return None;
        }
        pruned.sort();
        debug!("Pruned {} stale members from tag: {}", pruned.len(), tag);
        Some(InvalidationEvent::new(
            InvalidationReason::Pruned { tag: tag.to_string() },
            pruned,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::memory::InMemoryBackend;
    use crate::cache::types::CacheValue;
    use crate::error::{CacheError, CacheResult};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn index() -> (Arc<InMemoryBackend>, Arc<CacheStore>, TagIndex) {
        let backend = Arc::new(InMemoryBackend::new(CacheConfig::deterministic()));
        let store = Arc::new(CacheStore::new(backend.clone(), &CacheConfig::deterministic()));
        let index = TagIndex::new(store.clone());
        (backend, store, index)
    }

    fn tags(names: &[&str]) -> Vec<Tag> {
        names.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_tag_key() {
        assert_eq!(tag_key("users"), "tag:users");
    }

    #[tokio::test]
    async fn test_associate_and_invalidate() {
        let (backend, store, index) = index();

        store.set("user:id:1", b"a".to_vec(), None).await;
        store.set("user:id:2", b"b".to_vec(), None).await;
        index.associate("user:id:1", &tags(&["users", "org:7"])).await;
        index.associate("user:id:2", &tags(&["users"])).await;

        let events = index.invalidate(&tags(&["users"])).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].keys, vec!["user:id:1", "user:id:2"]);

        assert!(!backend.contains_key("user:id:1").await);
        assert!(!backend.contains_key("user:id:2").await);
        assert_eq!(backend.set_len("tag:users").await, 0);
        // Other tags keep their members until invalidated themselves
        assert_eq!(backend.set_len("tag:org:7").await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (_, store, index) = index();

        store.set("k", b"v".to_vec(), None).await;
        index.associate("k", &tags(&["t"])).await;

        assert_eq!(index.invalidate(&tags(&["t"])).await.len(), 1);
        assert!(index.invalidate(&tags(&["t"])).await.is_empty());
        assert!(index.invalidate(&tags(&["never-used"])).await.is_empty());
    }

    /// Backend whose batch deletes fail while `fail_deletes` is set
    struct FailingDeletes {
        inner: InMemoryBackend,
        fail_deletes: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl crate::cache::backend::CacheBackend for FailingDeletes {
        async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> CacheResult<()> {
            self.inner.set(key, value, ttl).await
        }
        async fn delete(&self, key: &str) -> CacheResult<()> {
            self.inner.delete(key).await
        }
        async fn delete_many(&self, keys: &[CacheKey]) -> CacheResult<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(CacheError::ConnectionError("connection reset".to_string()));
            }
            self.inner.delete_many(keys).await
        }
        async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
            self.inner.add_to_set(set_key, member).await
        }
        async fn members_of(&self, set_key: &str) -> CacheResult<HashSet<String>> {
            self.inner.members_of(set_key).await
        }
        async fn remove_from_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
            self.inner.remove_from_set(set_key, member).await
        }
        async fn delete_set(&self, set_key: &str) -> CacheResult<()> {
            self.inner.delete_set(set_key).await
        }
        async fn increment(&self, key: &str, by: i64) -> CacheResult<i64> {
            self.inner.increment(key, by).await
        }
        async fn exists(&self, key: &str) -> CacheResult<bool> {
            self.inner.exists(key).await
        }
        async fn flush(&self) -> CacheResult<()> {
            self.inner.flush().await
        }
        fn name(&self) -> &'static str {
            "failing-deletes"
        }
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_tag_set() {
        let backend = Arc::new(FailingDeletes {
            inner: InMemoryBackend::new(CacheConfig::deterministic()),
            fail_deletes: std::sync::atomic::AtomicBool::new(true),
        });
        let store = Arc::new(CacheStore::new(backend.clone(), &CacheConfig::deterministic()));
        let index = TagIndex::new(store.clone());

        store.set("k1", b"v".to_vec(), None).await;
        store.set("k2", b"v".to_vec(), None).await;
        index.associate("k1", &tags(&["a"])).await;
        index.associate("k2", &tags(&["b"])).await;

        // Every tag is attempted; none can complete
        assert!(index.invalidate(&tags(&["a", "b"])).await.is_empty());
        assert_eq!(backend.inner.set_len("tag:a").await, 1);
        assert_eq!(backend.inner.set_len("tag:b").await, 1);

        backend.fail_deletes.store(false, Ordering::SeqCst);
        let events = index.invalidate(&tags(&["a", "b"])).await;
        assert_eq!(events.len(), 2);
        assert!(!backend.inner.contains_key("k1").await);
        assert!(!backend.inner.contains_key("k2").await);
    }

    #[tokio::test]
    async fn test_prune_drops_only_absent_members() {
        let (backend, store, index) = index();

        store.set("live", b"v".to_vec(), None).await;
        index.associate("live", &tags(&["t"])).await;
        index.associate("gone", &tags(&["t"])).await;

        let event = index.prune("t").await.unwrap();
        assert_eq!(event.keys, vec!["gone"]);
        assert_eq!(event.reason, InvalidationReason::Pruned { tag: "t".to_string() });
        let members = index.members("t").await;
        assert_eq!(members.len(), 1);
        assert!(members.contains("live"));

        // Nothing is pruned while the backend cannot answer
        index.associate("gone", &tags(&["t"])).await;
        backend.simulate_outage(true);
        assert!(index.prune("t").await.is_none());
        backend.simulate_outage(false);
        assert_eq!(backend.set_len("tag:t").await, 2);
    }
}
