//! Two-phase membership write.

use activeset_core::EntityId;
use activeset_provider::{ProviderError, StateProvider};

/// Clear `group`, then set it to `members`.
///
/// The set is only issued once the clear has returned, so observers see
/// either the previous pass, a brief empty group, or this pass. An empty
/// `members` still performs both writes.
pub fn publish<P: StateProvider + ?Sized>(
    provider: &P,
    group: &EntityId,
    members: &[EntityId],
) -> Result<(), ProviderError> {
    provider.set_group_members(group, &[])?;
    provider.set_group_members(group, members)?;
    tracing::debug!(group = %group, members = members.len(), "membership published");
    Ok(())
}
