//! Cache key and tag naming
//!
//! Keys follow `"<entity_type_lowercase>:<discriminator>:<value...>"`,
//! e.g. `"user:id:42"` or `"user:all"`. Every entity type also owns two tags,
//! `"<type>"` and `"<type>_list"`, covering its list-shaped cache entries.

use crate::cache::types::{CacheKey, Tag};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Join non-empty parts with `:` after an optional prefix
pub fn build_key<I, S>(prefix: Option<&str>, parts: I) -> CacheKey
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut segments: Vec<String> = Vec::new();
    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        segments.push(prefix.to_string());
    }
    segments.extend(
        parts
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .filter(|p| !p.is_empty()),
    );
    segments.join(":")
}

/// Cache key builder for entity reads
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    entity_type: String,
    discriminator: Option<String>,
    values: Vec<String>,
}

impl CacheKeyBuilder {
    /// Create a builder for an entity type; the type name is lowercased
    pub fn new(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.to_lowercase(),
            discriminator: None,
            values: Vec::new(),
        }
    }

    /// Set the discriminator segment (`id`, `all`, `by`, ...)
    pub fn discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    /// Append a value segment
    pub fn value(mut self, value: impl ToString) -> Self {
        self.values.push(value.to_string());
        self
    }

    /// Build the cache key
    pub fn build(self) -> CacheKey {
        let mut parts = vec![self.entity_type];
        parts.extend(self.discriminator);
        parts.extend(self.values);
        build_key(None, parts)
    }
}

/// Key of a single record: `"<type>:id:<id>"`
pub fn entity_key(entity_type: &str, id: impl ToString) -> CacheKey {
    CacheKeyBuilder::new(entity_type)
        .discriminator("id")
        .value(id)
        .build()
}

/// Key of the unfiltered list: `"<type>:all"`
pub fn all_key(entity_type: &str) -> CacheKey {
    CacheKeyBuilder::new(entity_type).discriminator("all").build()
}

/// Key of a filtered list: `"<type>:by:<digest>"`
pub fn criteria_key<C: Serialize + ?Sized>(entity_type: &str, criteria: &C) -> CacheKey {
    CacheKeyBuilder::new(entity_type)
        .discriminator("by")
        .value(criteria_digest(criteria))
        .build()
}

/// Per-type tag: `"<type>"`
pub fn entity_tag(entity_type: &str) -> Tag {
    entity_type.to_lowercase()
}

/// Per-type list tag: `"<type>_list"`
pub fn list_tag(entity_type: &str) -> Tag {
    format!("{}_list", entity_type.to_lowercase())
}

/// Both tags covering list-shaped entries of a type
pub fn list_tags(entity_type: &str) -> Vec<Tag> {
    vec![entity_tag(entity_type), list_tag(entity_type)]
}

/// SHA-256 hex digest of serialized criteria
///
/// `serde_json::Map` keeps keys sorted, so equal criteria give equal digests
/// regardless of insertion order, on every build and every node.
pub fn criteria_digest<C: Serialize + ?Sized>(criteria: &C) -> String {
    let canonical = serde_json::to_string(criteria).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_builder() {
        let key = CacheKeyBuilder::new("User")
            .discriminator("id")
            .value(42)
            .build();
        assert_eq!(key, "user:id:42");

        let key = CacheKeyBuilder::new("Destination")
            .discriminator("user")
            .value(7)
            .value("active")
            .build();
        assert_eq!(key, "destination:user:7:active");
    }

    #[test]
    fn test_build_key_with_prefix() {
        assert_eq!(build_key(Some("prod"), ["user", "id", "1"]), "prod:user:id:1");
        assert_eq!(build_key(None, ["user", "", "all"]), "user:all");
        assert_eq!(build_key(Some(""), ["user"]), "user");
    }

    #[test]
    fn test_entity_keys_and_tags() {
        assert_eq!(entity_key("Session", "abc"), "session:id:abc");
        assert_eq!(all_key("Session"), "session:all");
        assert_eq!(entity_tag("Session"), "session");
        assert_eq!(list_tag("Session"), "session_list");
        assert_eq!(list_tags("Upload"), vec!["upload", "upload_list"]);
    }

    #[test]
    fn test_criteria_digest_is_order_independent() {
        let a: serde_json::Map<String, serde_json::Value> =
            serde_json::from_value(json!({"role": "admin", "active": true})).unwrap();
        let b: serde_json::Map<String, serde_json::Value> =
            serde_json::from_value(json!({"active": true, "role": "admin"})).unwrap();

        assert_eq!(criteria_digest(&a), criteria_digest(&b));
        assert_ne!(criteria_digest(&a), criteria_digest(&json!({"role": "user"})));
        assert!(criteria_key("User", &a).starts_with("user:by:"));
    }

    #[test]
    fn test_criteria_digest_is_stable_sha256() {
        // Keys are shared across deployments, so the digest must not depend on the build
        assert_eq!(
            criteria_digest(&json!({})),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert_eq!(
            criteria_key("User", &json!({"role": "admin"})),
            "user:by:78f00e6526ea513465c83fdfe6eb9a999a3f405cb023ddfabc26a2f24c8cb148"
        );
    }
}
