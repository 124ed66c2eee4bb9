//! Lifecycle events emitted around repository writes
//!
//! Events are fire-and-forget: a sink cannot fail a write. Names follow
//! `"<entity_type_lowercase>.<phase>"`, e.g. `"user.created"`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Default channel capacity for broadcast subscribers
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Subscription name matching every event
pub const WILDCARD: &str = "*";

/// Point in a write's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    BeforeCreate,
    Created,
    BeforeUpdate,
    Updated,
    BeforeDelete,
    Deleted,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::BeforeCreate => "before_create",
            LifecyclePhase::Created => "created",
            LifecyclePhase::BeforeUpdate => "before_update",
            LifecyclePhase::Updated => "updated",
            LifecyclePhase::BeforeDelete => "before_delete",
            LifecyclePhase::Deleted => "deleted",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named lifecycle notification with a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// `"<entity_type_lowercase>.<phase>"`
    pub name: String,

    /// Entity type as declared by the entity
    pub entity_type: String,

    pub phase: LifecyclePhase,

    /// Phase-specific data: `{"data": ..}`, `{"record": ..}` or
    /// `{"id": .., "data": .., "record": ..}`
    pub payload: Value,

    pub emitted_at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(entity_type: &str, phase: LifecyclePhase, payload: Value) -> Self {
        Self {
            name: event_name(entity_type, phase),
            entity_type: entity_type.to_string(),
            phase,
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// Event name for an entity type and phase
pub fn event_name(entity_type: &str, phase: LifecyclePhase) -> String {
    format!("{}.{}", entity_type.to_lowercase(), phase)
}

/// Receiver of lifecycle events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: LifecycleEvent);
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn emit(&self, _event: LifecycleEvent) {}
}

/// Sink that keeps every event in memory, for tests and auditing
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far, oldest first
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Names of all events received so far, oldest first
    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: LifecycleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Callback registered on an [`EventBus`]
pub type EventHandler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// In-process event bus with named handlers and broadcast subscribers
///
/// Handlers run inline during `emit`, in registration order. Handlers
/// registered under [`WILDCARD`] see every event. Broadcast receivers from
/// [`subscribe`](Self::subscribe) get a copy of every event.
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<(SubscriptionId, EventHandler)>>>,
    next_id: AtomicU64,
    broadcast_tx: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create a bus whose broadcast channel holds `capacity` events per lagging receiver
    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity);
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            broadcast_tx,
        }
    }

    /// Register a handler for an event name (or [`WILDCARD`])
    pub async fn on<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().await;
        handlers
            .entry(name.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler; returns false when it was not registered
    pub async fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().await;
        let mut removed = false;
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|(existing, _)| *existing != id);
            removed |= list.len() != before;
        }
        handlers.retain(|_, list| !list.is_empty());
        removed
    }

    /// Number of handlers registered for a name, wildcard handlers excluded
    pub async fn listener_count(&self, name: &str) -> usize {
        self.handlers.read().await.get(name).map_or(0, Vec::len)
    }

    /// Receive a copy of every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.broadcast_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.broadcast_tx.receiver_count())
            .finish()
    }
}

#[async_trait]
impl EventSink for EventBus {
    async fn emit(&self, event: LifecycleEvent) {
        let matching: Vec<EventHandler> = {
            let handlers = self.handlers.read().await;
            [event.name.as_str(), WILDCARD]
                .iter()
                .filter_map(|name| handlers.get(*name))
                .flatten()
                .map(|(_, handler)| handler.clone())
                .collect()
        };

        debug!("Emitting {} to {} handlers", event.name, matching.len());
        for handler in matching {
            handler(&event);
        }

        // No subscribers is not an error
        let _ = self.broadcast_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_event_names() {
        assert_eq!(event_name("User", LifecyclePhase::BeforeCreate), "user.before_create");
        assert_eq!(event_name("Upload", LifecyclePhase::Deleted), "upload.deleted");

        let event = LifecycleEvent::new("Session", LifecyclePhase::Updated, json!({"record": {}}));
        assert_eq!(event.name, "session.updated");
        assert_eq!(event.entity_type, "Session");
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let value = serde_json::to_value(LifecyclePhase::BeforeUpdate).unwrap();
        assert_eq!(value, json!("before_update"));
    }

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = RecordingEventSink::new();
        sink.emit(LifecycleEvent::new("User", LifecyclePhase::Created, json!({})))
            .await;
        sink.emit(LifecycleEvent::new("User", LifecyclePhase::Deleted, json!({})))
            .await;

        assert_eq!(sink.names(), vec!["user.created", "user.deleted"]);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_event_bus_on_and_off() {
        let bus = EventBus::new();
        let created = Arc::new(AtomicUsize::new(0));
        let everything = Arc::new(AtomicUsize::new(0));

        let counter = created.clone();
        let id = bus
            .on("user.created", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        let counter = everything.clone();
        bus.on(WILDCARD, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(bus.listener_count("user.created").await, 1);

        bus.emit(LifecycleEvent::new("User", LifecyclePhase::Created, json!({})))
            .await;
        bus.emit(LifecycleEvent::new("User", LifecyclePhase::Updated, json!({})))
            .await;
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(everything.load(Ordering::SeqCst), 2);

        assert!(bus.off(id).await);
        assert!(!bus.off(id).await);
        bus.emit(LifecycleEvent::new("User", LifecyclePhase::Created, json!({})))
            .await;
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("user.created").await, 0);
    }

    #[tokio::test]
    async fn test_event_bus_broadcast() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(LifecycleEvent::new("Upload", LifecyclePhase::Created, json!({"record": {"id": 1}})))
            .await;

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, "upload.created");
        assert_eq!(event.payload["record"]["id"], 1);
    }
}
