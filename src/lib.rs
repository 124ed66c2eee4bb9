//! # tagrepo
//!
//! A tag-indexed cache-aside data access layer.
//!
//! ## Features
//!
//! - Generic repository over any entity store, with read-through caching
//! - Tag index: bulk invalidation of unrelated cache keys sharing a tag
//! - Fail-open cache: a slow or dead cache store never fails a read or write
//! - Redis and in-memory cache backends
//! - Lifecycle events and hooks around every write
//! - Soft deletes with restore
//!
//! ## Consistency
//!
//! Every repository write finishes invalidating the cache before it returns,
//! so a caller never reads back data older than its own last write.
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//! use tagrepo::{
//!     cache::{CacheConfig, CacheService},
//!     store::{fields, Entity, InMemoryEntityStore},
//!     FindOptions, Repository, WriteOptions,
//! };
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     type Id = u64;
//!     const ENTITY_TYPE: &'static str = "User";
//!
//!     fn id(&self) -> &u64 {
//!         &self.id
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheService::connect(CacheConfig::from_env()?).await?;
//!     let store = Arc::new(InMemoryEntityStore::<User>::new().with_sequential_ids());
//!     let users: Repository<User, _> = Repository::new(store, cache);
//!
//!     let user = users
//!         .create(fields(serde_json::json!({"name": "Ada"})), &WriteOptions::new())
//!         .await?;
//!
//!     let cached = users
//!         .find_by_id(&user.id, &FindOptions::cached_with_tags(["users"]))
//!         .await?;
//!     println!("{:?}", cached);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod events;
pub mod repository;
pub mod store;

// Re-export main types for convenience
pub use cache::{CacheConfig, CacheKey, CacheOptions, CacheService, CacheStats, Eviction, Tag};
pub use error::{CacheError, RepositoryError, Result, StoreError};
pub use events::{EventBus, EventSink, LifecycleEvent, LifecyclePhase, NoopEventSink, RecordingEventSink};
pub use repository::{
    CreateOptions, DeleteOptions, FindOptions, Repository, RepositoryHooks, UpdateOptions,
    WriteOptions,
};
pub use store::{fields, Criteria, Entity, EntityStore, Fields, InMemoryEntityStore, Page, PageMeta};
