//! JSON-file state provider.
//!
//! The states file holds a JSON array of state objects
//! (`[{"entity_id": .., "state": .., "attributes": {..}}]`), the shape of a
//! state provider's REST export. It is re-read on every snapshot. Group
//! memberships go to a separate output file, a JSON object keyed by group id.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use activeset_core::{EntityId, EntityState, RawState, Snapshot};
use chrono::Utc;

use crate::error::ProviderError;
use crate::provider::StateProvider;

/// Read and parse a states file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, ProviderError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub struct FileProvider {
    states_path: PathBuf,
    output_path: PathBuf,
    /// Serializes read-modify-write cycles issued from this process.
    write_lock: Mutex<()>,
}

impl FileProvider {
    pub fn new(states_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            states_path: states_path.into(),
            output_path: output_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn states_path(&self) -> &Path {
        &self.states_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn read_output(&self) -> Result<serde_json::Map<String, serde_json::Value>, ProviderError> {
        match fs::read_to_string(&self.output_path) {
            Ok(content) if content.trim().is_empty() => Ok(serde_json::Map::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl StateProvider for FileProvider {
    fn get_all_states(&self) -> Result<Snapshot, ProviderError> {
        load_snapshot(&self.states_path)
    }

    fn set_group_members(
        &self,
        group: &EntityId,
        members: &[EntityId],
    ) -> Result<(), ProviderError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut output = self.read_output()?;
        output.insert(group.to_string(), serde_json::to_value(members)?);
        write_atomic(&self.output_path, &serde_json::to_vec_pretty(&output)?)
    }

    fn set_entity_state(&self, entity_id: &EntityId, state: &RawState) -> Result<(), ProviderError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entities = load_snapshot(&self.states_path)?.into_inner();
        match entities.iter_mut().find(|e| &e.entity_id == entity_id) {
            Some(entity) if entity.state.canonical() == state.canonical() => return Ok(()),
            Some(entity) => {
                entity.state = state.clone();
                entity.last_changed = Some(Utc::now());
            }
            None => {
                let mut entity = EntityState::new(entity_id.clone(), state.clone());
                entity.last_changed = Some(Utc::now());
                entities.push(entity);
            }
        }
        write_atomic(&self.states_path, &serde_json::to_vec_pretty(&entities)?)
    }
}

/// Write through a sibling temp file and rename, so readers never observe
/// a half-written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ProviderError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
