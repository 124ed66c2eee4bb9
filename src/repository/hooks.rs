//! Per-entity lifecycle callbacks
//!
//! Before-hooks may veto a write by returning `Err(reason)`. After-hooks
//! return extra tags whose cache entries the write must invalidate, e.g. a
//! destination update invalidating `"user_<owner>_destinations"`.

use crate::cache::types::Tag;
use crate::store::{Entity, Fields};
use std::fmt;
use std::sync::Arc;

/// Outcome of a before-hook; `Err` carries the rejection reason
pub type HookResult = std::result::Result<(), String>;

pub type BeforeCreateHook = Arc<dyn Fn(&Fields) -> HookResult + Send + Sync>;
pub type BeforeUpdateHook<E> = Arc<dyn Fn(&E, &Fields) -> HookResult + Send + Sync>;
pub type BeforeDeleteHook<E> = Arc<dyn Fn(&E) -> HookResult + Send + Sync>;
pub type AfterHook<E> = Arc<dyn Fn(&E) -> Vec<Tag> + Send + Sync>;

/// Optional callbacks run around repository writes
pub struct RepositoryHooks<E: Entity> {
    before_create: Option<BeforeCreateHook>,
    after_create: Option<AfterHook<E>>,
    before_update: Option<BeforeUpdateHook<E>>,
    after_update: Option<AfterHook<E>>,
    before_delete: Option<BeforeDeleteHook<E>>,
    after_delete: Option<AfterHook<E>>,
}

impl<E: Entity> RepositoryHooks<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Fields) -> HookResult + Send + Sync + 'static,
    {
        self.before_create = Some(Arc::new(hook));
        self
    }

    pub fn on_after_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E) -> Vec<Tag> + Send + Sync + 'static,
    {
        self.after_create = Some(Arc::new(hook));
        self
    }

    /// Receives the current record and the incoming fields
    pub fn on_before_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E, &Fields) -> HookResult + Send + Sync + 'static,
    {
        self.before_update = Some(Arc::new(hook));
        self
    }

    pub fn on_after_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E) -> Vec<Tag> + Send + Sync + 'static,
    {
        self.after_update = Some(Arc::new(hook));
        self
    }

    pub fn on_before_delete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E) -> HookResult + Send + Sync + 'static,
    {
        self.before_delete = Some(Arc::new(hook));
        self
    }

    /// Receives the record as it was right after the delete
    pub fn on_after_delete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&E) -> Vec<Tag> + Send + Sync + 'static,
    {
        self.after_delete = Some(Arc::new(hook));
        self
    }

    pub(crate) fn before_create(&self, data: &Fields) -> HookResult {
        self.before_create.as_ref().map_or(Ok(()), |hook| hook(data))
    }

    pub(crate) fn before_update(&self, record: &E, data: &Fields) -> HookResult {
        self.before_update
            .as_ref()
            .map_or(Ok(()), |hook| hook(record, data))
    }

    pub(crate) fn before_delete(&self, record: &E) -> HookResult {
        self.before_delete.as_ref().map_or(Ok(()), |hook| hook(record))
    }

    pub(crate) fn after_create(&self, record: &E) -> Vec<Tag> {
        Self::tags_from(&self.after_create, record)
    }

    pub(crate) fn after_update(&self, record: &E) -> Vec<Tag> {
        Self::tags_from(&self.after_update, record)
    }

    pub(crate) fn after_delete(&self, record: &E) -> Vec<Tag> {
        Self::tags_from(&self.after_delete, record)
    }

    fn tags_from(hook: &Option<AfterHook<E>>, record: &E) -> Vec<Tag> {
        hook.as_ref().map(|hook| hook(record)).unwrap_or_default()
    }
}

impl<E: Entity> Default for RepositoryHooks<E> {
    fn default() -> Self {
        Self {
            before_create: None,
            after_create: None,
            before_update: None,
            after_update: None,
            before_delete: None,
            after_delete: None,
        }
    }
}

impl<E: Entity> Clone for RepositoryHooks<E> {
    fn clone(&self) -> Self {
        Self {
            before_create: self.before_create.clone(),
            after_create: self.after_create.clone(),
            before_update: self.before_update.clone(),
            after_update: self.after_update.clone(),
            before_delete: self.before_delete.clone(),
            after_delete: self.after_delete.clone(),
        }
    }
}

impl<E: Entity> fmt::Debug for RepositoryHooks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryHooks")
            .field("before_create", &self.before_create.is_some())
            .field("after_create", &self.after_create.is_some())
            .field("before_update", &self.before_update.is_some())
            .field("after_update", &self.after_update.is_some())
            .field("before_delete", &self.before_delete.is_some())
            .field("after_delete", &self.after_delete.is_some())
            .finish()
    }
}
