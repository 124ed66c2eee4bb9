//! Redis cache backend
//!
//! Values map to Redis strings (`PSETEX` when a TTL is given), tag sets map
//! to Redis sets. The `ConnectionManager` reconnects on its own, so a Redis
//! restart shows up as a burst of failed calls rather than a dead backend.

use crate::cache::backend::CacheBackend;
use crate::cache::types::{CacheKey, CacheValue};
use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use std::collections::HashSet;
use std::time::Duration;
use tracing::info;

/// Redis-backed implementation of [`CacheBackend`]
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379/0`)
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = Client::open(url)
            .map_err(|e| CacheError::ConnectionError(format!("invalid Redis URL {}: {}", url, e)))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::ConnectionError(format!("Redis connection error: {}", e)))?;

        info!("Connected to Redis cache backend");
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheValue>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn.clone();

        match ttl {
            Some(ttl) => {
                // PSETEX rejects a zero expiry
                let millis = (ttl.as_millis() as u64).max(1);
                let _: () = conn.pset_ex(key, value, millis).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn delete_many(&self, keys: &[CacheKey]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let _: i64 = conn.del(keys.to_vec()).await?;
        Ok(())
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.sadd(set_key, member).await?;
        Ok(())
    }

    async fn members_of(&self, set_key: &str) -> CacheResult<HashSet<String>> {
        let mut conn = self.conn.clone();
        let members: HashSet<String> = conn.smembers(set_key).await?;
        Ok(members)
    }

    async fn remove_from_set(&self, set_key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.srem(set_key, member).await?;
        Ok(())
    }

    async fn delete_set(&self, set_key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(set_key).await?;
        Ok(())
    }

    async fn increment(&self, key: &str, by: i64) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, by).await?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = ::redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        info!("Flushed Redis database");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
