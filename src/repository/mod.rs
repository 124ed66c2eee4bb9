//! Generic cache-aside repository
//!
//! [`Repository`] composes an [`EntityStore`], a [`CacheService`], an
//! [`EventSink`] and optional [`RepositoryHooks`] for one entity type.
//!
//! Reads consult the cache only when the caller asks for it. Every write
//! finishes its cache invalidation before returning, in this order:
//!
//! 1. tags returned by the after-hook
//! 2. the record's own key `"<type>:id:<id>"` (update, delete, restore)
//! 3. the caller's tags
//! 4. the list tags `"<type>"` and `"<type>_list"`
//!
//! Store errors pass through unchanged and nothing is retried.

pub mod hooks;
pub mod options;

pub use hooks::{HookResult, RepositoryHooks};
pub use options::{CreateOptions, DeleteOptions, FindOptions, UpdateOptions, WriteOptions};

use crate::cache::keys::{all_key, criteria_key, entity_key, entity_tag, list_tags};
use crate::cache::{CacheKey, CacheService, Tag};
use crate::error::{RepositoryError, Result};
use crate::events::{EventSink, LifecycleEvent, LifecyclePhase, NoopEventSink};
use crate::store::{Criteria, Entity, EntityStore, Fields, Page};
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

/// Cache-aside repository for one entity type
pub struct Repository<E: Entity, S: EntityStore<E>> {
    store: Arc<S>,
    cache: CacheService,
    events: Arc<dyn EventSink>,
    hooks: RepositoryHooks<E>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, S: EntityStore<E>> Repository<E, S> {
    /// Repository with no hooks and events dropped
    pub fn new(store: Arc<S>, cache: CacheService) -> Self {
        Self {
            store,
            cache,
            events: Arc::new(NoopEventSink),
            hooks: RepositoryHooks::default(),
            _entity: PhantomData,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_hooks(mut self, hooks: RepositoryHooks<E>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// Cache key of one record: `"<type>:id:<id>"`
    pub fn cache_key(&self, id: &E::Id) -> CacheKey {
        entity_key(E::ENTITY_TYPE, id)
    }

    // ==========================================
    // Reads
    // ==========================================

    /// Fetch one record, through the cache when `options.cache` is set
    ///
    /// A cached soft-deleted record counts as a miss unless deleted records
    /// were asked for.
    pub async fn find_by_id(&self, id: &E::Id, options: &FindOptions) -> Result<Option<E>> {
        let Some(cache_options) = &options.cache else {
            return Ok(self.store.find_by_id(id, options.include_deleted).await?);
        };

        let key = self.cache_key(id);
        if let Some(cached) = self.cache.get::<E>(&key).await {
            if options.include_deleted || !cached.is_deleted() {
                return Ok(Some(cached));
            }
        }

        let record = self.store.find_by_id(id, options.include_deleted).await?;
        if let Some(record) = &record {
            let cache_options = cache_options.clone().with_tag(entity_tag(E::ENTITY_TYPE));
            self.cache.set(&key, record, &cache_options).await;
        }
        Ok(record)
    }

    /// Like [`find_by_id`](Self::find_by_id) but absent records are an error
    pub async fn find_by_id_or_fail(&self, id: &E::Id, options: &FindOptions) -> Result<E> {
        self.find_by_id(id, options)
            .await?
            .ok_or_else(|| RepositoryError::not_found(E::ENTITY_TYPE, id))
    }

    /// All records, cached under `"<type>:all"` when requested
    pub async fn find_all(&self, options: &FindOptions) -> Result<Vec<E>> {
        let key = Self::list_key(all_key(E::ENTITY_TYPE), options.include_deleted);
        let store = self.store.clone();
        let include_deleted = options.include_deleted;

        self.read_list(key, options, || async move {
            store.find_all(include_deleted).await
        })
        .await
    }

    /// Records matching every criterion, cached under `"<type>:by:<digest>"` when requested
    pub async fn find_by(&self, criteria: &Criteria, options: &FindOptions) -> Result<Vec<E>> {
        let key = Self::list_key(criteria_key(E::ENTITY_TYPE, criteria), options.include_deleted);
        let store = self.store.clone();
        let include_deleted = options.include_deleted;

        self.read_list(key, options, || async move {
            store.find_where(criteria, include_deleted).await
        })
        .await
    }

    /// First record matching every criterion
    pub async fn find_one_by(&self, criteria: &Criteria, options: &FindOptions) -> Result<Option<E>> {
        Ok(self.find_by(criteria, options).await?.into_iter().next())
    }

    /// Whether any live record matches; never cached
    pub async fn exists(&self, criteria: &Criteria) -> Result<bool> {
        Ok(self.store.count(criteria).await? > 0)
    }

    /// Number of live records matching; never cached
    pub async fn count(&self, criteria: &Criteria) -> Result<u64> {
        Ok(self.store.count(criteria).await?)
    }

    /// One page of live records; never cached
    pub async fn paginate(&self, page: u64, per_page: u64, criteria: &Criteria) -> Result<Page<E>> {
        Ok(self.store.paginate(page, per_page, criteria).await?)
    }

    // ==========================================
    // Writes
    // ==========================================

    pub async fn create(&self, data: Fields, options: &CreateOptions) -> Result<E> {
        if !options.skip_hooks {
            self.hooks
                .before_create(&data)
                .map_err(|reason| self.rejected(LifecyclePhase::BeforeCreate, reason))?;
            self.emit(LifecyclePhase::BeforeCreate, json!({ "data": data }))
                .await;
        }

        let record = self.store.insert(data).await?;

        let hook_tags = if options.skip_hooks {
            Vec::new()
        } else {
            self.emit(LifecyclePhase::Created, json!({ "record": to_json(&record) }))
                .await;
            self.hooks.after_create(&record)
        };

        self.invalidate_after_write(hook_tags, None, &options.tags)
            .await;

        debug!("Created {} {}", E::ENTITY_TYPE, record.id());
        Ok(record)
    }

    pub async fn update(&self, id: &E::Id, data: Fields, options: &UpdateOptions) -> Result<E> {
        let current = self.find_by_id_or_fail(id, &FindOptions::default()).await?;

        if !options.skip_hooks {
            self.hooks
                .before_update(&current, &data)
                .map_err(|reason| self.rejected(LifecyclePhase::BeforeUpdate, reason))?;
            self.emit(
                LifecyclePhase::BeforeUpdate,
                json!({ "id": to_json(id), "data": data, "record": to_json(&current) }),
            )
            .await;
        }

        let record = self.store.merge_and_save(id, data).await?;

        let hook_tags = if options.skip_hooks {
            Vec::new()
        } else {
            self.emit(LifecyclePhase::Updated, json!({ "record": to_json(&record) }))
                .await;
            self.hooks.after_update(&record)
        };

        self.invalidate_after_write(hook_tags, Some(id), &options.tags)
            .await;

        debug!("Updated {} {}", E::ENTITY_TYPE, id);
        Ok(record)
    }

    /// Soft delete when `options.soft` and the entity supports it, hard delete otherwise
    pub async fn delete(&self, id: &E::Id, options: &DeleteOptions) -> Result<()> {
        let current = self.find_by_id_or_fail(id, &FindOptions::default()).await?;

        if !options.skip_hooks {
            self.hooks
                .before_delete(&current)
                .map_err(|reason| self.rejected(LifecyclePhase::BeforeDelete, reason))?;
            self.emit(LifecyclePhase::BeforeDelete, json!({ "record": to_json(&current) }))
                .await;
        }

        let record = if options.soft && self.store.supports_soft_delete() {
            self.store.soft_delete(id).await?
        } else {
            self.store.hard_delete(id).await?;
            current
        };

        let hook_tags = if options.skip_hooks {
            Vec::new()
        } else {
            self.emit(LifecyclePhase::Deleted, json!({ "record": to_json(&record) }))
                .await;
            self.hooks.after_delete(&record)
        };

        self.invalidate_after_write(hook_tags, Some(id), &options.tags)
            .await;

        debug!("Deleted {} {}", E::ENTITY_TYPE, id);
        Ok(())
    }

    /// Clear `deleted_at` on a soft-deleted record and return it
    pub async fn restore(&self, id: &E::Id) -> Result<E> {
        if !self.store.supports_soft_delete() {
            return Err(RepositoryError::UnsupportedOperation(format!(
                "{} does not support soft deletes",
                E::ENTITY_TYPE
            )));
        }

        let options = FindOptions::new().with_deleted();
        self.find_by_id_or_fail(id, &options).await?;

        let record = self.store.restore(id).await?;
        self.invalidate_after_write(Vec::new(), Some(id), &[]).await;

        debug!("Restored {} {}", E::ENTITY_TYPE, id);
        Ok(record)
    }

    /// Invalidate the `"<type>"` and `"<type>_list"` tags
    pub async fn invalidate_list_caches(&self) {
        self.cache.invalidate_tags(&list_tags(E::ENTITY_TYPE)).await;
    }

    // ==========================================
    // Helpers
    // ==========================================

    async fn read_list<F, Fut>(&self, key: CacheKey, options: &FindOptions, load: F) -> Result<Vec<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = crate::error::StoreResult<Vec<E>>>,
    {
        let Some(cache_options) = &options.cache else {
            return Ok(load().await?);
        };

        let cache_options = cache_options
            .clone()
            .with_tags(list_tags(E::ENTITY_TYPE));
        let records = self
            .cache
            .remember(&key, &cache_options, || async move { load().await.map_err(RepositoryError::from) })
            .await?;
        Ok(records)
    }

    fn list_key(key: CacheKey, include_deleted: bool) -> CacheKey {
        if include_deleted {
            format!("{}:with_deleted", key)
        } else {
            key
        }
    }

    async fn invalidate_after_write(&self, hook_tags: Vec<Tag>, id: Option<&E::Id>, caller_tags: &[Tag]) {
        if !hook_tags.is_empty() {
            self.cache.invalidate_tags(&hook_tags).await;
        }

        if let Some(id) = id {
            self.cache.delete(&self.cache_key(id)).await;
        }

        if !caller_tags.is_empty() {
            self.cache.invalidate_tags(caller_tags).await;
        }

        self.invalidate_list_caches().await;
    }

    async fn emit(&self, phase: LifecyclePhase, payload: Value) {
        self.events
            .emit(LifecycleEvent::new(E::ENTITY_TYPE, phase, payload))
            .await;
    }

    fn rejected(&self, phase: LifecyclePhase, reason: String) -> RepositoryError {
        let event = crate::events::event_name(E::ENTITY_TYPE, phase);
        info!("Hook rejected {}: {}", event, reason);
        RepositoryError::HookRejected { event, reason }
    }
}

impl<E: Entity, S: EntityStore<E>> Clone for Repository<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            events: self.events.clone(),
            hooks: self.hooks.clone(),
            _entity: PhantomData,
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
