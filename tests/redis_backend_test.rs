//! Redis backend tests against a throwaway container
//!
//! Requires Docker. Run with:
//! ```bash
//! cargo test --test redis_backend_test -- --ignored
//! ```

use std::time::Duration;
use tagrepo::cache::{CacheBackend, CacheConfig, CacheOptions, CacheService, RedisBackend};
use testcontainers::clients::Cli;
use testcontainers_modules::redis::Redis;

#[tokio::test]
#[ignore = "requires docker"]
async fn test_redis_backend_primitives() {
    let docker = Cli::default();
    let node = docker.run(Redis::default());
    let url = format!("redis://127.0.0.1:{}", node.get_host_port_ipv4(6379));

    let backend = RedisBackend::connect(&url).await.unwrap();
    assert_eq!(backend.name(), "redis");

    backend.set("k", b"v".to_vec(), None).await.unwrap();
    assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));
    assert!(backend.exists("k").await.unwrap());

    backend.add_to_set("tag:t", "k").await.unwrap();
    backend.add_to_set("tag:t", "k").await.unwrap();
    assert_eq!(backend.members_of("tag:t").await.unwrap().len(), 1);

    assert_eq!(backend.increment("n", 5).await.unwrap(), 5);
    assert_eq!(backend.increment("n", -2).await.unwrap(), 3);

    backend.delete_many(&["k".to_string(), "n".to_string()]).await.unwrap();
    assert!(backend.get("k").await.unwrap().is_none());

    backend.set("short", b"x".to_vec(), Some(Duration::from_millis(50))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(!backend.exists("short").await.unwrap());

    backend.flush().await.unwrap();
    assert!(backend.members_of("tag:t").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_tag_invalidation_over_redis() {
    let docker = Cli::default();
    let node = docker.run(Redis::default());
    let url = format!("redis://127.0.0.1:{}", node.get_host_port_ipv4(6379));

    let config = CacheConfig::builder()
        .redis_url(url.clone())
        .key_prefix("it")
        .no_default_ttl()
        .build();
    let cache = CacheService::connect(config).await.unwrap();

    cache.set("k1", &"a", &CacheOptions::tagged(["users"])).await;
    cache.set("k2", &"b", &CacheOptions::tagged(["users"])).await;
    assert_eq!(cache.get::<String>("k1").await.as_deref(), Some("a"));

    let events = cache.invalidate_tags(&["users".to_string()]).await;
    assert_eq!(events[0].keys.len(), 2);
    assert!(cache.get::<String>("k1").await.is_none());
    assert!(cache.get::<String>("k2").await.is_none());

    // The prefixed tag set is gone from the server as well
    let raw = RedisBackend::connect(&url).await.unwrap();
    assert!(!raw.exists("it:tag:users").await.unwrap());
    assert!(!raw.exists("it:k1").await.unwrap());
}
