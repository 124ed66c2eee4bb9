//! Repository demo application
//!
//! Walks through cached reads, tag invalidation from hooks, soft deletes and
//! lifecycle events.
//!
//! Usage:
//!   cargo run --example repository_demo
//!
//! Environment variables:
//!   TAGREPO_REDIS_URL   - Redis URL; the in-memory cache is used when unset
//!   TAGREPO_KEY_PREFIX  - Prefix for every cache key
//!   RUST_LOG            - Log filter (default: info)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tagrepo::{
    cache::{CacheConfig, CacheOptions, CacheService},
    fields, DeleteOptions, Entity, EventBus, FindOptions, InMemoryEntityStore, Repository,
    RepositoryHooks, WriteOptions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Destination {
    id: u64,
    owner_id: u64,
    city: String,
    #[serde(default)]
    deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Destination {
    type Id = u64;
    const ENTITY_TYPE: &'static str = "Destination";
    const SOFT_DELETE: bool = true;

    fn id(&self) -> &u64 {
        &self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

fn owner_tag(owner_id: u64) -> String {
    format!("user_{}_destinations", owner_id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("=== Tag-indexed repository demo ===");

    let config = CacheConfig::from_env()?;
    let cache = CacheService::connect(config).await?;
    info!("Cache backend: {}", cache.store().backend_name());

    let events = Arc::new(EventBus::new());
    events
        .on("*", |event| info!("event {} {}", event.name, event.payload))
        .await;

    let hooks = RepositoryHooks::new()
        .on_before_create(|data| match data.get("city").and_then(|c| c.as_str()) {
            Some(city) if !city.is_empty() => Ok(()),
            _ => Err("city is required".to_string()),
        })
        .on_after_update(|d: &Destination| vec![owner_tag(d.owner_id)])
        .on_after_delete(|d: &Destination| vec![owner_tag(d.owner_id)]);

    let store = Arc::new(InMemoryEntityStore::<Destination>::new().with_sequential_ids());
    let destinations: Repository<Destination, _> = Repository::new(store, cache.clone())
        .with_events(events.clone())
        .with_hooks(hooks);

    info!("\n--- Create ---");
    for city in ["Lisbon", "Porto", "Faro"] {
        destinations
            .create(fields(json!({ "owner_id": 7, "city": city })), &WriteOptions::new())
            .await?;
    }
    if let Err(e) = destinations
        .create(fields(json!({ "owner_id": 7 })), &WriteOptions::new())
        .await
    {
        info!("Rejected as expected: {}", e);
    }

    info!("\n--- Cached reads ---");
    let by_owner = fields(json!({ "owner_id": 7 }));
    let options = FindOptions::cached_with_tags([owner_tag(7)]);
    let listed = destinations.find_by(&by_owner, &options).await?;
    info!("Owner 7 has {} destinations", listed.len());
    destinations.find_by(&by_owner, &options).await?;

    let stats = cache.stats();
    info!("Cache hits: {}, misses: {}", stats.hits, stats.misses);

    info!("\n--- Side cache invalidated by hook tags ---");
    cache
        .set(
            "dashboard:user:7",
            &json!({ "destinations": listed.len() }),
            &CacheOptions::tagged([owner_tag(7)]),
        )
        .await;
    destinations
        .update(&1, fields(json!({ "city": "Lisboa" })), &WriteOptions::new())
        .await?;
    info!(
        "Dashboard still cached after update: {}",
        cache.exists("dashboard:user:7").await
    );

    info!("\n--- Soft delete and restore ---");
    destinations.delete(&2, &DeleteOptions::new()).await?;
    info!(
        "Live destinations: {}",
        destinations.find_all(&FindOptions::cached()).await?.len()
    );
    let restored = destinations.restore(&2).await?;
    info!("Restored {}", restored.city);

    let page = destinations.paginate(1, 2, &Default::default()).await?;
    info!(
        "Page {}/{} holds {} of {}",
        page.meta.current_page,
        page.meta.last_page,
        page.data.len(),
        page.meta.total
    );

    info!("\nFinal cache stats: {}", cache.stats());
    Ok(())
}
