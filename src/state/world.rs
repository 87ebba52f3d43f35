use crate::state::entity::{EntityData, WorldSnapshot};
use crate::state::hub::{Hub, Listener, SlowListenerPolicy};
use crate::subscription::protocol::{entity_message, snapshot_message};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// World maintains the authoritative in-memory entity state
///
/// Reads go straight to the map. `set`, `update` and `clear` run under the
/// hub's listener lock, so per-entity broadcasts leave in mutation order.
/// Lock order is always hub → map shard.
pub struct World {
    /// Lock-free concurrent map for fast reads
    entities: DashMap<String, EntityData>,

    /// Listener set and fan-out
    hub: Hub,
}

/// A registered listener's receiving side
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    /// Outbound messages; the first one is always the world snapshot
    pub rx: mpsc::Receiver<Arc<str>>,
}

impl World {
    pub fn new() -> Self {
        Self::with_policy(SlowListenerPolicy::default())
    }

    pub fn with_policy(policy: SlowListenerPolicy) -> Self {
        Self {
            entities: DashMap::new(),
            hub: Hub::new(policy),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Get entity data, or an empty mapping if absent
    pub fn get(&self, entity: &str) -> EntityData {
        self.entities
            .get(entity)
            .map(|data| data.clone())
            .unwrap_or_default()
    }

    /// Replace an entity wholesale and broadcast it
    pub fn set(&self, entity: &str, data: EntityData) {
        let mut listeners = self.hub.lock();
        let message = entity_message(entity, &data);
        self.entities.insert(entity.to_string(), data);
        debug!(entity = %entity, listeners = listeners.len(), "Entity set");
        self.hub.broadcast_locked(&mut listeners, message);
    }

    /// Merge a single field into an entity (creating it) and broadcast the result
    pub fn update(&self, entity: &str, field: &str, value: Value) {
        let mut listeners = self.hub.lock();
        let message = {
            let mut data = self.entities.entry(entity.to_string()).or_default();
            data.insert(field.to_string(), value);
            entity_message(entity, &data)
        };
        debug!(entity = %entity, field = %field, "Entity field updated");
        self.hub.broadcast_locked(&mut listeners, message);
    }

    /// Broadcast an entity's current data without changing it
    pub fn notify(&self, entity: &str) {
        let mut listeners = self.hub.lock();
        let message = entity_message(entity, &self.get(entity));
        self.hub.broadcast_locked(&mut listeners, message);
    }

    /// Remove all entities. Listeners are not told.
    pub fn clear(&self) {
        let _listeners = self.hub.lock();
        let removed = self.entities.len();
        self.entities.clear();
        info!(removed = removed, "World cleared");
    }

    /// Entire current world
    pub fn snapshot(&self) -> WorldSnapshot {
        self.entities
            .iter()
            .map(|e| (e.key().clone(), Value::Object(e.value().clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Register a new listener; its first queued message is the snapshot
    ///
    /// Taking the snapshot under the hub lock means no broadcast can be
    /// queued ahead of it.
    pub fn subscribe(&self, capacity: usize) -> Subscription {
        let mut listeners = self.hub.lock();
        let (listener, rx) = Listener::new(capacity);
        let id = listener.id;

        // Fresh queue has capacity >= 1, so this cannot be full
        let _ = listener.try_send(snapshot_message(self.snapshot()));
        self.hub.register_locked(&mut listeners, listener);

        info!(listener_id = %id, listeners = listeners.len(), "Subscriber registered");
        Subscription { id, rx }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
