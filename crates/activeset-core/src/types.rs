use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Entity identifier ────────────────────────────────────────────

/// Identifier of a tracked entity, `category.name`.
///
/// Externally assigned. Parsing never fails: an identifier without a `.`
/// uses the whole string as both category and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split on the first separator into `(category, name)`.
    pub fn split(&self) -> (&str, &str) {
        match self.0.split_once('.') {
            Some((category, name)) => (category, name),
            None => (&self.0, &self.0),
        }
    }

    pub fn category(&self) -> &str {
        self.split().0
    }

    pub fn name(&self) -> &str {
        self.split().1
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ─── Raw state ────────────────────────────────────────────────────

/// Raw state value as reported by the state provider.
///
/// Comparisons go through [`RawState::canonical`], so `0`, `"0"` and a
/// configured integer `0` all compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawState {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Null,
}

impl RawState {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Canonical string form used for equality and set membership.
    ///
    /// Booleans map onto the on/off tokens; null is the empty string.
    /// Whole floats drop their fraction, so `0.0` and `0` compare equal.
    pub fn canonical(&self) -> String {
        match self {
            Self::Bool(true) => crate::normalize::ACTIVE_TOKEN.to_string(),
            Self::Bool(false) => crate::normalize::INACTIVE_TOKEN.to_string(),
            Self::Number(n) => canonical_number(n),
            Self::Text(s) => s.clone(),
            Self::Null => String::new(),
        }
    }
}

/// Largest magnitude below which every whole `f64` is exactly an `i64`.
const EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

fn canonical_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < EXACT_F64_INT => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

impl fmt::Display for RawState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<&str> for RawState {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for RawState {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for RawState {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<bool> for RawState {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ─── Snapshot ─────────────────────────────────────────────────────

/// One entity's record in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: EntityId,
    pub state: RawState,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<DateTime<Utc>>,
}

impl EntityState {
    pub fn new(entity_id: impl Into<EntityId>, state: impl Into<RawState>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: serde_json::Map::new(),
            last_changed: None,
        }
    }
}

/// Full point-in-time read of every tracked entity.
///
/// Enumeration order is the provider's order and is preserved; the
/// aggregator's output order depends on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entities: Vec<EntityState>,
}

impl Snapshot {
    pub fn new(entities: Vec<EntityState>) -> Self {
        Self { entities }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityState> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&EntityState> {
        self.entities.iter().find(|e| &e.entity_id == entity_id)
    }

    pub fn into_inner(self) -> Vec<EntityState> {
        self.entities
    }
}

impl FromIterator<EntityState> for Snapshot {
    fn from_iter<I: IntoIterator<Item = EntityState>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a EntityState;
    type IntoIter = std::slice::Iter<'a, EntityState>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

// ─── Activity ─────────────────────────────────────────────────────

/// Binary signal produced by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Active,
    Inactive,
}

impl Activity {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

// ─── Tests ────────────────────────────────────────────────────────
