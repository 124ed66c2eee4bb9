//! Entity store adapter
//!
//! CRUD access to the persistent store for one entity type, with no
//! knowledge of caching. Writes take loosely-typed [`Fields`] (merge
//! semantics on update: only supplied fields change); reads return typed
//! entities.

pub mod memory;
pub mod pagination;

pub use memory::{IdStrategy, InMemoryEntityStore};
pub use pagination::{Page, PageMeta};

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::Hash;

/// Column values for inserts and merges
pub type Fields = Map<String, Value>;

/// Equality filter: every listed column must match
pub type Criteria = Map<String, Value>;

/// Convert a JSON object into [`Fields`]; anything else gives an empty map
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// A persisted record type
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier type
    type Id: Clone
        + Eq
        + Hash
        + fmt::Display
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Type name used in cache keys, tags and event names
    const ENTITY_TYPE: &'static str;

    /// Whether deletes only stamp `deleted_at`
    const SOFT_DELETE: bool = false;

    /// Column holding the identifier
    const ID_FIELD: &'static str = "id";

    /// Column holding the soft-delete marker
    const DELETED_AT_FIELD: &'static str = "deleted_at";

    fn id(&self) -> &Self::Id;

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// Persistence for one entity type
///
/// Finds on a soft-delete type skip rows with `deleted_at` set unless
/// `include_deleted` is passed.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    async fn find_by_id(&self, id: &E::Id, include_deleted: bool) -> StoreResult<Option<E>>;

    async fn find_all(&self, include_deleted: bool) -> StoreResult<Vec<E>>;

    async fn find_where(&self, criteria: &Criteria, include_deleted: bool) -> StoreResult<Vec<E>>;

    /// Insert a new row and return it as stored
    async fn insert(&self, fields: Fields) -> StoreResult<E>;

    /// Merge `fields` into an existing row and return the result
    async fn merge_and_save(&self, id: &E::Id, fields: Fields) -> StoreResult<E>;

    /// Stamp `deleted_at` and return the stamped row
    async fn soft_delete(&self, id: &E::Id) -> StoreResult<E>;

    async fn hard_delete(&self, id: &E::Id) -> StoreResult<()>;

    /// Clear `deleted_at` and return the restored row
    async fn restore(&self, id: &E::Id) -> StoreResult<E>;

    fn supports_soft_delete(&self) -> bool {
        E::SOFT_DELETE
    }

    /// Number of live rows matching the criteria
    async fn count(&self, criteria: &Criteria) -> StoreResult<u64> {
        Ok(self.find_where(criteria, false).await?.len() as u64)
    }

    /// One page of live rows matching the criteria; pages start at 1
    async fn paginate(&self, page: u64, per_page: u64, criteria: &Criteria) -> StoreResult<Page<E>> {
        let rows = self.find_where(criteria, false).await?;
        Ok(Page::from_items(rows, page, per_page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_from_json() {
        let map = fields(json!({"name": "ada", "age": 36}));
        assert_eq!(map.len(), 2);
        assert_eq!(map["name"], json!("ada"));

        assert!(fields(json!([1, 2, 3])).is_empty());
        assert!(fields(Value::Null).is_empty());
    }
}
