//! Snapshot -> ordered membership list.

use crate::exclusion::ExclusionFilter;
use crate::normalize::Normalizer;
use crate::types::{EntityId, Snapshot};

/// Derive the active membership list from a full snapshot.
///
/// The demand entity, when configured, is always the first member. The rest
/// follows snapshot enumeration order: excluded categories are skipped, every
/// remaining entity whose state normalizes to active is appended.
///
/// No deduplication: an active, non-excluded demand entity appears twice.
pub fn aggregate(
    snapshot: &Snapshot,
    exclusions: &ExclusionFilter,
    normalizer: &Normalizer,
    demand: Option<&EntityId>,
) -> Vec<EntityId> {
    let mut members = Vec::with_capacity(snapshot.len() + 1);
    if let Some(demand) = demand {
        members.push(demand.clone());
    }

    for entity in snapshot {
        if exclusions.is_excluded(&entity.entity_id) {
            continue;
        }
        let category = entity.entity_id.category();
        if normalizer.normalize(category, &entity.state).is_active() {
            members.push(entity.entity_id.clone());
        }
    }

    members
}
