//! In-memory entity store
//!
//! Rows are kept as JSON objects in insertion order and decoded into the
//! entity type on every read, so a row that does not fit the entity is
//! rejected at write time rather than surfacing later.

use crate::error::{StoreError, StoreResult};
use crate::store::{Criteria, Entity, EntityStore, Fields};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// How identifiers are assigned to rows inserted without one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// Random v4 UUID strings
    Uuid,
    /// Integers counting up from 1
    Sequential,
}

/// [`EntityStore`] backed by a vector of JSON rows
pub struct InMemoryEntityStore<E: Entity> {
    rows: RwLock<Vec<Fields>>,
    id_strategy: IdStrategy,
    next_id: AtomicU64,
    unique_fields: Vec<String>,
    unavailable: AtomicBool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> InMemoryEntityStore<E> {
    /// Empty store assigning UUID identifiers
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            id_strategy: IdStrategy::Uuid,
            next_id: AtomicU64::new(1),
            unique_fields: Vec::new(),
            unavailable: AtomicBool::new(false),
            _entity: PhantomData,
        }
    }

    /// Assign integer identifiers counting up from 1
    pub fn with_sequential_ids(mut self) -> Self {
        self.id_strategy = IdStrategy::Sequential;
        self
    }

    /// Reject writes that would duplicate `field` across live rows
    pub fn with_unique(mut self, field: impl Into<String>) -> Self {
        self.unique_fields.push(field.into());
        self
    }

    /// Make every call fail with a connection error until switched off
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored rows, soft-deleted ones included
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionError(format!(
                "{} store unavailable",
                E::ENTITY_TYPE
            )));
        }
        Ok(())
    }

    fn id_value(id: &E::Id) -> StoreResult<Value> {
        serde_json::to_value(id).map_err(|e| StoreError::SerializationError(e.to_string()))
    }

    fn decode(row: &Fields) -> StoreResult<E> {
        serde_json::from_value(Value::Object(row.clone()))
            .map_err(|e| StoreError::SerializationError(format!("{} row: {}", E::ENTITY_TYPE, e)))
    }

    fn is_live(row: &Fields) -> bool {
        !E::SOFT_DELETE || row.get(E::DELETED_AT_FIELD).map_or(true, Value::is_null)
    }

    fn visible(row: &Fields, include_deleted: bool) -> bool {
        include_deleted || Self::is_live(row)
    }

    fn matches(row: &Fields, criteria: &Criteria) -> bool {
        criteria
            .iter()
            .all(|(field, expected)| row.get(field).unwrap_or(&Value::Null) == expected)
    }

    fn position(rows: &[Fields], id: &Value) -> Option<usize> {
        rows.iter().position(|row| row.get(E::ID_FIELD) == Some(id))
    }

    fn missing(id: &E::Id) -> StoreError {
        StoreError::RecordMissing {
            entity: E::ENTITY_TYPE.to_string(),
            id: id.to_string(),
        }
    }

    fn next_id(&self) -> Value {
        match self.id_strategy {
            IdStrategy::Uuid => Value::String(Uuid::new_v4().to_string()),
            IdStrategy::Sequential => Value::from(self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
    }

    /// Next generated id not already taken by an explicitly inserted row
    fn unused_id(&self, rows: &[Fields]) -> Value {
        loop {
            let candidate = self.next_id();
            if Self::position(rows, &candidate).is_none() {
                return candidate;
            }
            debug!("Skipping taken {} id {}", E::ENTITY_TYPE, candidate);
        }
    }

    /// Enforce unique columns against every other live row
    fn check_unique(&self, rows: &[Fields], candidate: &Fields, skip: Option<usize>) -> StoreResult<()> {
        for field in &self.unique_fields {
            let Some(value) = candidate.get(field).filter(|v| !v.is_null()) else {
                continue;
            };

            let clash = rows.iter().enumerate().any(|(index, row)| {
                Some(index) != skip && Self::is_live(row) && row.get(field) == Some(value)
            });
            if clash {
                return Err(StoreError::ConstraintViolation(format!(
                    "{}.{} must be unique, {} already exists",
                    E::ENTITY_TYPE.to_lowercase(),
                    field,
                    value
                )));
            }
        }
        Ok(())
    }

    /// Replace a row after validating it still decodes
    async fn rewrite<F>(&self, id: &E::Id, change: F) -> StoreResult<E>
    where
        F: FnOnce(&mut Fields) + Send,
    {
        self.check_available()?;
        let id_value = Self::id_value(id)?;
        let mut rows = self.rows.write().await;

        let index = Self::position(&rows, &id_value).ok_or_else(|| Self::missing(id))?;
        let mut candidate = rows[index].clone();
        change(&mut candidate);
        candidate.insert(E::ID_FIELD.to_string(), id_value);

        let entity = Self::decode(&candidate)?;
        self.check_unique(&rows, &candidate, Some(index))?;
        rows[index] = candidate;
        Ok(entity)
    }
}

impl<E: Entity> Default for InMemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for InMemoryEntityStore<E> {
    async fn find_by_id(&self, id: &E::Id, include_deleted: bool) -> StoreResult<Option<E>> {
        self.check_available()?;
        let id_value = Self::id_value(id)?;
        let rows = self.rows.read().await;

        match Self::position(&rows, &id_value) {
            Some(index) if Self::visible(&rows[index], include_deleted) => {
                Self::decode(&rows[index]).map(Some)
            }
            _ => Ok(None),
        }
    }

    async fn find_all(&self, include_deleted: bool) -> StoreResult<Vec<E>> {
        self.check_available()?;
        let rows = self.rows.read().await;

        rows.iter()
            .filter(|row| Self::visible(row, include_deleted))
            .map(Self::decode)
            .collect()
    }

    async fn find_where(&self, criteria: &Criteria, include_deleted: bool) -> StoreResult<Vec<E>> {
        self.check_available()?;
        let rows = self.rows.read().await;

        rows.iter()
            .filter(|row| Self::visible(row, include_deleted) && Self::matches(row, criteria))
            .map(Self::decode)
            .collect()
    }

    async fn insert(&self, mut fields: Fields) -> StoreResult<E> {
        self.check_available()?;
        let mut rows = self.rows.write().await;

        let id = match fields.get(E::ID_FIELD).filter(|v| !v.is_null()) {
            Some(id) => {
                if Self::position(&rows, id).is_some() {
                    return Err(StoreError::ConstraintViolation(format!(
                        "{} with id {} already exists",
                        E::ENTITY_TYPE,
                        id
                    )));
                }
                id.clone()
            }
            None => self.unused_id(&rows),
        };
        fields.insert(E::ID_FIELD.to_string(), id);

        if E::SOFT_DELETE {
            fields
                .entry(E::DELETED_AT_FIELD.to_string())
                .or_insert(Value::Null);
        }

        let entity = Self::decode(&fields)?;
        self.check_unique(&rows, &fields, None)?;
        rows.push(fields);

        debug!("Inserted {} {}", E::ENTITY_TYPE, entity.id());
        Ok(entity)
    }

    async fn merge_and_save(&self, id: &E::Id, fields: Fields) -> StoreResult<E> {
        self.rewrite(id, move |row| {
            for (field, value) in fields {
                row.insert(field, value);
            }
        })
        .await
    }

    async fn soft_delete(&self, id: &E::Id) -> StoreResult<E> {
        if !E::SOFT_DELETE {
            return Err(StoreError::Other(format!(
                "{} does not support soft deletes",
                E::ENTITY_TYPE
            )));
        }

        let now = serde_json::to_value(Utc::now())
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        self.rewrite(id, move |row| {
            row.insert(E::DELETED_AT_FIELD.to_string(), now);
        })
        .await
    }

    async fn hard_delete(&self, id: &E::Id) -> StoreResult<()> {
        self.check_available()?;
        let id_value = Self::id_value(id)?;
        let mut rows = self.rows.write().await;

        let index = Self::position(&rows, &id_value).ok_or_else(|| Self::missing(id))?;
        rows.remove(index);
        Ok(())
    }

    async fn restore(&self, id: &E::Id) -> StoreResult<E> {
        if !E::SOFT_DELETE {
            return Err(StoreError::Other(format!(
                "{} does not support soft deletes",
                E::ENTITY_TYPE
            )));
        }

        self.rewrite(id, |row| {
            row.insert(E::DELETED_AT_FIELD.to_string(), Value::Null);
        })
        .await
    }
}
