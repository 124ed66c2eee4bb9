//! Per-call repository options

use crate::cache::{CacheOptions, Tag};
use std::time::Duration;

/// Options for reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Return soft-deleted records as well
    pub include_deleted: bool,

    /// Read through the cache with these options; `None` goes straight to the store
    pub cache: Option<CacheOptions>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read through the cache with default options
    pub fn cached() -> Self {
        Self::cached_with(CacheOptions::default())
    }

    /// Read through the cache filing results under the given tags
    pub fn cached_with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Tag>,
    {
        Self::cached_with(CacheOptions::tagged(tags))
    }

    pub fn cached_with(options: CacheOptions) -> Self {
        Self {
            include_deleted: false,
            cache: Some(options),
        }
    }

    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Cache results for `ttl` (enables caching if it was off)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Some(self.cache.unwrap_or_default().with_ttl(ttl));
        self
    }
}

/// Options for create and update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip hooks and their lifecycle events; cache invalidation still runs
    pub skip_hooks: bool,

    /// Extra tags to invalidate after the write
    pub tags: Vec<Tag>,
}

pub type CreateOptions = WriteOptions;
pub type UpdateOptions = WriteOptions;

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_hooks(mut self) -> Self {
        self.skip_hooks = true;
        self
    }

    pub fn invalidating<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Tag>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Options for delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Soft delete when the entity supports it; hard delete otherwise
    pub soft: bool,

    /// Skip hooks and their lifecycle events; cache invalidation still runs
    pub skip_hooks: bool,

    /// Extra tags to invalidate after the delete
    pub tags: Vec<Tag>,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            soft: true,
            skip_hooks: false,
            tags: Vec::new(),
        }
    }
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the row even when soft deletes are supported
    pub fn hard() -> Self {
        Self {
            soft: false,
            ..Self::default()
        }
    }

    pub fn skip_hooks(mut self) -> Self {
        self.skip_hooks = true;
        self
    }

    pub fn invalidating<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Tag>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}
