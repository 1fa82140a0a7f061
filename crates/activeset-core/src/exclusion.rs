//! Category-based exclusion.

use std::collections::BTreeSet;

use crate::types::EntityId;

/// Categories excluded from every job: group-of-groups, zone markers and
/// persistent notifications.
pub const BUILTIN_EXCLUSIONS: [&str; 3] = ["group", "zone", "persistent_notification"];

/// Decides whether an entity's category disqualifies it.
///
/// Built-ins are always part of the set: caller-supplied categories extend
/// it, never replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionFilter {
    categories: BTreeSet<String>,
}

impl ExclusionFilter {
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut categories: BTreeSet<String> = extra.into_iter().map(Into::into).collect();
        categories.extend(BUILTIN_EXCLUSIONS.iter().map(|c| (*c).to_string()));
        Self { categories }
    }

    pub fn is_excluded(&self, entity_id: &EntityId) -> bool {
        self.categories.contains(entity_id.category())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}
