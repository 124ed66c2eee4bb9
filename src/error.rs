//! Error types for the repository and cache layers
//!
//! Three error families live here:
//! - [`CacheError`]: transport failures between a cache backend and the
//!   fail-open adapter. Never surfaced to repository callers.
//! - [`StoreError`]: failures reported by an entity store. Passed through
//!   unmodified.
//! - [`RepositoryError`]: the public taxonomy returned by repository operations.

use thiserror::Error;

/// Errors raised by cache backends
#[derive(Error, Debug)]
pub enum CacheError {
    /// Connection error - network or connection pool issues
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Operation exceeded the configured timeout
    #[error("Cache operation timed out after {timeout_ms}ms: {operation}")]
    TimeoutError { timeout_ms: u64, operation: String },

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Redis driver error (wrapper)
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// Generic error with context
    #[error("Cache error: {0}")]
    Other(String),
}

/// Errors raised by entity stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed row does not exist in the store
    #[error("{entity} record missing from store: {id}")]
    RecordMissing { entity: String, id: String },

    /// A uniqueness or integrity constraint was violated
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The store could not be reached
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    /// A row could not be converted to or from the entity type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error with context
    #[error("Store error: {0}")]
    Other(String),
}

/// Errors returned by repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Requested record is absent after an `*_or_fail` lookup
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The operation is not available for this entity type
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A before-hook rejected the write
    #[error("Hook rejected {event}: {reason}")]
    HookRejected { event: String, reason: String },

    /// Opaque passthrough of the entity store's error
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RepositoryError {
    /// Build a `NotFound` error for an entity type and id
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Check whether this is a `NotFound` error
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Result type alias for entity store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for cache backend operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

impl From<String> for StoreError {
    fn from(s: String) -> Self {
        StoreError::Other(s)
    }
}

impl From<&str> for StoreError {
    fn from(s: &str) -> Self {
        StoreError::Other(s.to_string())
    }
}

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RepositoryError::not_found("User", 42);
        assert_eq!(error.to_string(), "User not found: 42");
        assert!(error.is_not_found());

        let timeout_error = CacheError::TimeoutError {
            timeout_ms: 250,
            operation: "get".to_string(),
        };
        assert!(timeout_error.to_string().contains("timed out after 250ms"));

        let unsupported = RepositoryError::UnsupportedOperation(
            "Upload does not support soft deletes".to_string(),
        );
        assert!(!unsupported.is_not_found());
    }

    #[test]
    fn test_store_error_passes_through_unmodified() {
        let store_error = StoreError::ConstraintViolation("duplicate email".to_string());
        let error: RepositoryError = store_error.into();
        assert_eq!(error.to_string(), "Constraint violation: duplicate email");
        assert!(matches!(
            error,
            RepositoryError::Store(StoreError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_error_conversion() {
        let error: StoreError = "test error".into();
        assert!(matches!(error, StoreError::Other(_)));

        let error: CacheError = "test error".to_string().into();
        assert!(matches!(error, CacheError::Other(_)));
    }
}
