//! StateProvider trait and push-notification shapes.

use std::sync::Arc;

use activeset_core::{EntityId, RawState, Snapshot};

use crate::error::ProviderError;

/// Capability set consumed from the external state provider.
///
/// Calls are blocking request/response; timeout and retry policy belong to
/// the implementation. Enables mock injection for testing.
pub trait StateProvider: Send + Sync {
    /// Full snapshot of every tracked entity, in provider order.
    fn get_all_states(&self) -> Result<Snapshot, ProviderError>;

    /// Replace the membership of `group`. Idempotent.
    fn set_group_members(&self, group: &EntityId, members: &[EntityId])
    -> Result<(), ProviderError>;

    /// Set one entity's state. Idempotent.
    fn set_entity_state(&self, entity_id: &EntityId, state: &RawState)
    -> Result<(), ProviderError>;
}

impl<T: StateProvider + ?Sized> StateProvider for &T {
    fn get_all_states(&self) -> Result<Snapshot, ProviderError> {
        (**self).get_all_states()
    }

    fn set_group_members(
        &self,
        group: &EntityId,
        members: &[EntityId],
    ) -> Result<(), ProviderError> {
        (**self).set_group_members(group, members)
    }

    fn set_entity_state(&self, entity_id: &EntityId, state: &RawState) -> Result<(), ProviderError> {
        (**self).set_entity_state(entity_id, state)
    }
}

impl<T: StateProvider + ?Sized> StateProvider for Arc<T> {
    fn get_all_states(&self) -> Result<Snapshot, ProviderError> {
        (**self).get_all_states()
    }

    fn set_group_members(
        &self,
        group: &EntityId,
        members: &[EntityId],
    ) -> Result<(), ProviderError> {
        (**self).set_group_members(group, members)
    }

    fn set_entity_state(&self, entity_id: &EntityId, state: &RawState) -> Result<(), ProviderError> {
        (**self).set_entity_state(entity_id, state)
    }
}

/// Push notification from the state provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// An entity's state changed. `old` is `None` for a newly seen entity.
    StateChanged {
        entity_id: EntityId,
        old: Option<RawState>,
        new: RawState,
    },
    /// The provider (or its host) started or restarted.
    SystemStarted,
}

/// State-change notifications between two snapshots, in `new` order.
///
/// Entities whose canonical state is unchanged produce nothing; removed
/// entities produce nothing.
pub fn diff_snapshots(old: &Snapshot, new: &Snapshot) -> Vec<ProviderEvent> {
    new.iter()
        .filter_map(|entity| {
            let previous = old.get(&entity.entity_id).map(|e| &e.state);
            let changed = previous.is_none_or(|p| p.canonical() != entity.state.canonical());
            changed.then(|| ProviderEvent::StateChanged {
                entity_id: entity.entity_id.clone(),
                old: previous.cloned(),
                new: entity.state.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use activeset_core::EntityState;

    struct Fixed;

    impl StateProvider for Fixed {
        fn get_all_states(&self) -> Result<Snapshot, ProviderError> {
            Ok([EntityState::new("light.a", "on")].into_iter().collect())
        }

        fn set_group_members(&self, _: &EntityId, _: &[EntityId]) -> Result<(), ProviderError> {
            Ok(())
        }

        fn set_entity_state(&self, _: &EntityId, _: &RawState) -> Result<(), ProviderError> {
            Err(ProviderError::Rejected("read-only".into()))
        }
    }

    #[test]
    fn blanket_ref_and_arc_impls() {
        let fixed = Fixed;
        let by_ref: &Fixed = &fixed;
        assert_eq!(by_ref.get_all_states().expect("ok").len(), 1);

        let shared: Arc<dyn StateProvider> = Arc::new(Fixed);
        assert!(
            shared
                .set_entity_state(&EntityId::new("light.a"), &RawState::text("off"))
                .is_err()
        );
    }

    #[test]
    fn diff_reports_changed_and_new_entities() {
        let old: Snapshot = [
            EntityState::new("light.a", "on"),
            EntityState::new("light.b", "off"),
            EntityState::new("light.gone", "on"),
        ]
        .into_iter()
        .collect();
        let new: Snapshot = [
            EntityState::new("light.a", "on"),
            EntityState::new("light.b", "on"),
            EntityState::new("fan.c", "low"),
        ]
        .into_iter()
        .collect();

        let events = diff_snapshots(&old, &new);
        assert_eq!(
            events,
            vec![
                ProviderEvent::StateChanged {
                    entity_id: EntityId::new("light.b"),
                    old: Some(RawState::text("off")),
                    new: RawState::text("on"),
                },
                ProviderEvent::StateChanged {
                    entity_id: EntityId::new("fan.c"),
                    old: None,
                    new: RawState::text("low"),
                },
            ]
        );
    }

    #[test]
    fn diff_compares_canonical_values() {
        let old: Snapshot = [EntityState::new("sensor.x", RawState::from(0))]
            .into_iter()
            .collect();
        let new: Snapshot = [EntityState::new("sensor.x", "0")].into_iter().collect();
        assert!(diff_snapshots(&old, &new).is_empty());
    }
}
