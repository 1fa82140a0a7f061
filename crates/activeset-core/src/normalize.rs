//! Raw state -> [`Activity`] normalization.
//!
//! Devices expose one canonical "off" value but many "on" representations
//! (brightness levels, fan speeds, mode names), so anything that is not
//! explicitly off counts as active.

use std::collections::BTreeSet;

use crate::types::{Activity, RawState};

/// The active token.
pub const ACTIVE_TOKEN: &str = "on";
/// The built-in inactive token, always a member of every [`OffStates`].
pub const INACTIVE_TOKEN: &str = "off";

/// Set of raw values treated as inactive, stored in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffStates {
    values: BTreeSet<String>,
}

impl OffStates {
    /// Build from configured values, unioned with [`INACTIVE_TOKEN`].
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RawState>,
    {
        let mut set: BTreeSet<String> = values.into_iter().map(|v| v.into().canonical()).collect();
        set.insert(INACTIVE_TOKEN.to_string());
        Self { values: set }
    }

    pub fn contains(&self, state: &RawState) -> bool {
        self.values.contains(&state.canonical())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for OffStates {
    fn default() -> Self {
        Self::new(std::iter::empty::<RawState>())
    }
}

/// Maps raw states to [`Activity`] under a fixed [`OffStates`].
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    off_states: OffStates,
}

impl Normalizer {
    pub fn new(off_states: OffStates) -> Self {
        Self { off_states }
    }

    pub fn off_states(&self) -> &OffStates {
        &self.off_states
    }

    /// Normalize one entity's raw state.
    ///
    /// 1. the active token -> `Active`
    /// 2. a member of the off-state set -> `Inactive`
    /// 3. anything else -> `Active`
    ///
    /// The category does not influence the result. Never fails.
    pub fn normalize(&self, _category: &str, state: &RawState) -> Activity {
        let canonical = state.canonical();
        if canonical == ACTIVE_TOKEN {
            Activity::Active
        } else if self.off_states.values.contains(&canonical) {
            Activity::Inactive
        } else {
            Activity::Active
        }
    }
}
