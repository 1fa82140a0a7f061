//! In-memory state provider.
//!
//! Records every write in order and serves a controllable entity table,
//! making it easy to write deterministic tests for the coordinator. Also
//! backs one-shot runs over a snapshot loaded from disk.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use activeset_core::{EntityId, EntityState, RawState, Snapshot};
use chrono::Utc;
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::provider::{ProviderEvent, StateProvider};

/// A write issued against the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderWrite {
    GroupMembers {
        group: EntityId,
        members: Vec<EntityId>,
    },
    EntityState {
        entity_id: EntityId,
        state: RawState,
    },
}

#[derive(Debug, Default)]
struct Inner {
    entities: Vec<EntityState>,
    groups: BTreeMap<EntityId, Vec<EntityId>>,
    writes: Vec<ProviderWrite>,
    snapshot_reads: usize,
    failing_snapshots: usize,
    reject_group_writes: bool,
    listener: Option<mpsc::UnboundedSender<ProviderEvent>>,
}

impl Inner {
    /// Upsert an entity and notify the listener if its canonical state moved.
    fn apply_state(&mut self, entity_id: &EntityId, state: &RawState) {
        let old = match self.entities.iter_mut().find(|e| &e.entity_id == entity_id) {
            Some(entity) => {
                let old = std::mem::replace(&mut entity.state, state.clone());
                if old.canonical() == state.canonical() {
                    return;
                }
                entity.last_changed = Some(Utc::now());
                Some(old)
            }
            None => {
                let mut entity = EntityState::new(entity_id.clone(), state.clone());
                entity.last_changed = Some(Utc::now());
                self.entities.push(entity);
                None
            }
        };
        self.notify(ProviderEvent::StateChanged {
            entity_id: entity_id.clone(),
            old,
            new: state.clone(),
        });
    }

    fn notify(&mut self, event: ProviderEvent) {
        let closed = match &self.listener {
            Some(tx) => tx.send(event).is_err(),
            None => false,
        };
        if closed {
            self.listener = None;
        }
    }
}

/// Test-double and offline provider backed by an ordered entity table.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    inner: Mutex<Inner>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider preloaded with `snapshot`, in its order.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let provider = Self::new();
        provider.lock().entities = snapshot.into_inner();
        provider
    }

    #[must_use]
    pub fn with_entity(self, entity_id: &str, state: impl Into<RawState>) -> Self {
        self.lock()
            .entities
            .push(EntityState::new(entity_id, state.into()));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to push notifications. Replaces any previous listener.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().listener = Some(tx);
        rx
    }

    /// External state change (a device or a user), not recorded as a write.
    pub fn set_state(&self, entity_id: &str, state: impl Into<RawState>) {
        self.lock().apply_state(&EntityId::new(entity_id), &state.into());
    }

    /// Drop an entity from the table.
    pub fn remove(&self, entity_id: &str) {
        self.lock().entities.retain(|e| e.entity_id.as_str() != entity_id);
    }

    /// Announce a provider restart to the listener.
    pub fn restart(&self) {
        self.lock().notify(ProviderEvent::SystemStarted);
    }

    /// Make the next `count` snapshot reads fail.
    pub fn fail_next_snapshots(&self, count: usize) {
        self.lock().failing_snapshots = count;
    }

    /// Reject every group write while `reject` is set.
    pub fn reject_group_writes(&self, reject: bool) {
        self.lock().reject_group_writes = reject;
    }

    /// Every write issued so far, in order.
    pub fn writes(&self) -> Vec<ProviderWrite> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    pub fn snapshot_reads(&self) -> usize {
        self.lock().snapshot_reads
    }

    /// Current membership of `group`, `None` if never written.
    pub fn group_members(&self, group: &str) -> Option<Vec<EntityId>> {
        self.lock().groups.get(&EntityId::new(group)).cloned()
    }

    /// Current membership of every written group.
    pub fn groups(&self) -> BTreeMap<EntityId, Vec<EntityId>> {
        self.lock().groups.clone()
    }

    pub fn state_of(&self, entity_id: &str) -> Option<RawState> {
        self.lock()
            .entities
            .iter()
            .find(|e| e.entity_id.as_str() == entity_id)
            .map(|e| e.state.clone())
    }
}

impl StateProvider for MemoryProvider {
    fn get_all_states(&self) -> Result<Snapshot, ProviderError> {
        let mut inner = self.lock();
        inner.snapshot_reads += 1;
        if inner.failing_snapshots > 0 {
            inner.failing_snapshots -= 1;
            return Err(ProviderError::Unavailable("injected snapshot failure".into()));
        }
        Ok(Snapshot::new(inner.entities.clone()))
    }

    fn set_group_members(
        &self,
        group: &EntityId,
        members: &[EntityId],
    ) -> Result<(), ProviderError> {
        let mut inner = self.lock();
        if inner.reject_group_writes {
            return Err(ProviderError::Rejected(format!("group write to {group}")));
        }
        inner.writes.push(ProviderWrite::GroupMembers {
            group: group.clone(),
            members: members.to_vec(),
        });
        inner.groups.insert(group.clone(), members.to_vec());

        // Group entities expose their membership as the `entity_id` attribute.
        let listed: Vec<serde_json::Value> = members
            .iter()
            .map(|m| serde_json::Value::String(m.to_string()))
            .collect();
        if let Some(entity) = inner.entities.iter_mut().find(|e| &e.entity_id == group) {
            entity
                .attributes
                .insert("entity_id".into(), serde_json::Value::Array(listed));
        }
        Ok(())
    }

    fn set_entity_state(&self, entity_id: &EntityId, state: &RawState) -> Result<(), ProviderError> {
        let mut inner = self.lock();
        inner.writes.push(ProviderWrite::EntityState {
            entity_id: entity_id.clone(),
            state: state.clone(),
        });
        inner.apply_state(entity_id, state);
        Ok(())
    }
}
