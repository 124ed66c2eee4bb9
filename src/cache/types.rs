//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache key type - `"<entity>:<discriminator>:<value...>"` by convention
pub type CacheKey = String;

/// Cache value type - serialized bytes as stored by the backend
pub type CacheValue = Vec<u8>;

/// Invalidation tag identifier
pub type Tag = String;

/// Statistics and metrics for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache hits
    pub hits: u64,

    /// Total number of cache misses (including corrupt entries)
    pub misses: u64,

    /// Number of values written
    pub sets: u64,

    /// Number of tags invalidated
    pub tag_invalidations: u64,

    /// Number of keys removed through tag invalidation
    pub invalidated_keys: u64,

    /// Number of backend calls that failed or timed out
    pub failures: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, sets: {}, tags invalidated: {}, keys invalidated: {}, failures: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.sets,
            self.tag_invalidations,
            self.invalidated_keys,
            self.failures
        )
    }
}

/// Lock-free counters shared between the cache service and its store adapter
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    tag_invalidations: AtomicU64,
    invalidated_keys: AtomicU64,
    failures: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tag_invalidated(&self, keys: usize) {
        self.tag_invalidations.fetch_add(1, Ordering::Relaxed);
        self.invalidated_keys
            .fetch_add(keys as u64, Ordering::Relaxed);
    }

    pub(crate) fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            tag_invalidations: self.tag_invalidations.load(Ordering::Relaxed),
            invalidated_keys: self.invalidated_keys.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };

        assert_eq!(stats.hit_rate(), 80.0);
        assert_eq!(stats.miss_rate(), 20.0);
    }

    #[test]
    fn test_cache_stats_zero_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 100.0);
    }

    #[test]
    fn test_recorder_snapshot() {
        let recorder = StatsRecorder::default();
        recorder.hit();
        recorder.hit();
        recorder.miss();
        recorder.tag_invalidated(3);
        recorder.failure();

        let stats = recorder.snapshot();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.tag_invalidations, 1);
        assert_eq!(stats.invalidated_keys, 3);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            hits: 100,
            misses: 50,
            ..Default::default()
        };

        let display = format!("{}", stats);
        assert!(display.contains("hits: 100"));
        assert!(display.contains("misses: 50"));
    }
}
