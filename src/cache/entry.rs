//! Cache entry management with TTL support

use crate::cache::types::{CacheKey, CacheValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored value held by the in-memory backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cache key
    pub key: CacheKey,

    /// The cached value
    pub value: CacheValue,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    /// Create a new cache entry. `None` stores the entry without expiry.
    pub fn new(key: CacheKey, value: CacheValue, ttl: Option<Duration>) -> Self {
        let mut entry = Self {
            key,
            value,
            metadata: CacheMetadata {
                expires_at: expiry_from(Utc::now(), ttl),
                size_bytes: 0,
            },
        };
        entry.metadata.size_bytes = entry.calculate_size();
        entry
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        match self.metadata.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Get time until expiration; `None` when expired or never expiring
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let expires_at = self.metadata.expires_at?;
        (expires_at - Utc::now()).to_std().ok()
    }

    /// Calculate the size of this entry in bytes
    pub fn calculate_size(&self) -> usize {
        // Approximate size: key + value + metadata overhead
        self.key.len() + self.value.len() + std::mem::size_of::<CacheMetadata>()
    }
}

fn expiry_from(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl?).ok()?;
    now.checked_add_signed(ttl)
}

/// Metadata associated with a cache entry. Recency lives in the backend's LRU order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry expires, if ever
    pub expires_at: Option<DateTime<Utc>>,

    /// Approximate size in bytes
    pub size_bytes: usize,
}
