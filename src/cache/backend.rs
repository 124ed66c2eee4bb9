//! Raw key-value store contract
//!
//! Implementations report transport failures as [`CacheError`]; the
//! fail-open [`CacheStore`](crate::cache::adapter::CacheStore) decides what a
//! failure means for callers.

use crate::cache::types::{CacheKey, CacheValue};
use crate::error::CacheResult;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

/// Key-value store with TTL and set-membership operations
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value; `None` when absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>>;

    /// Store a value, overwriting any previous one. `None` means no expiry.
    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove a value; absent keys are a no-op
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove several values in one call
    async fn delete_many(&self, keys: &[CacheKey]) -> CacheResult<()>;

    /// Add a member to a set, creating the set if needed
    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()>;

    /// All members of a set; empty when the set does not exist
    async fn members_of(&self, set_key: &str) -> CacheResult<HashSet<String>>;

    /// Remove a single member from a set
    async fn remove_from_set(&self, set_key: &str, member: &str) -> CacheResult<()>;

    /// Remove a whole set
    async fn delete_set(&self, set_key: &str) -> CacheResult<()>;

    /// Add `by` to an integer counter and return the new value
    async fn increment(&self, key: &str, by: i64) -> CacheResult<i64>;

    /// Whether a live value exists under the key
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Remove every value and set
    async fn flush(&self) -> CacheResult<()>;

    /// Backend name for log lines
    fn name(&self) -> &'static str;
}
