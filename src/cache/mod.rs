//! # Tag-Indexed Caching Layer
//!
//! Cache-aside storage for repository reads, with bulk invalidation by tag.
//!
//! ## Layers
//!
//! - **Backend** ([`CacheBackend`]): raw key-value store with TTL and sets.
//!   [`InMemoryBackend`] and [`RedisBackend`] ship with the crate.
//! - **Store adapter** ([`CacheStore`]): fail-open wrapper. Every call is
//!   time-bounded; failures are logged and read as a miss or a no-op.
//! - **Tag index** ([`TagIndex`]): `"tag:<tag>"` sets listing the keys
//!   written under each tag.
//! - **Service** ([`CacheService`]): typed `get`/`set`/`remember` plus
//!   `invalidate_tags`.
//!
//! ## Example
//!
//! ```rust
//! use tagrepo::cache::{CacheConfig, CacheOptions, CacheService};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::builder()
//!     .default_ttl(Duration::from_secs(300))
//!     .operation_timeout(Duration::from_millis(200))
//!     .build();
//!
//! let cache = CacheService::connect(config).await?;
//!
//! cache.set("user:id:42", &"Ada", &CacheOptions::tagged(["users"])).await;
//! assert_eq!(cache.get::<String>("user:id:42").await.as_deref(), Some("Ada"));
//!
//! cache.invalidate_tags(&["users".to_string()]).await;
//! assert!(cache.get::<String>("user:id:42").await.is_none());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod backend;
pub mod config;
pub mod entry;
pub mod invalidation;
pub mod keys;
pub mod memory;
pub mod redis;
pub mod service;
pub mod tags;
pub mod types;

pub use adapter::CacheStore;
pub use backend::CacheBackend;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use keys::{build_key, CacheKeyBuilder};
pub use memory::InMemoryBackend;
pub use self::redis::RedisBackend;
pub use service::{CacheOptions, CacheService, Eviction};
pub use tags::{tag_key, TagIndex};
pub use types::{CacheKey, CacheStats, CacheValue, Tag};
