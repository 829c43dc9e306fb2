use std::collections::HashMap;

use parking_lot::Mutex;

use super::{Artifact, ModelStore, validate_key};
use crate::Result;

/// Keeps artifacts in memory, they are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: Mutex<HashMap<String, Artifact>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryStore {
    fn save(&self, key: &str, artifact: &Artifact) -> Result<()> {
        validate_key(key)?;
        self.artifacts
            .lock()
            .insert(key.to_string(), artifact.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Artifact>> {
        validate_key(key)?;
        Ok(self.artifacts.lock().get(key).cloned())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.artifacts.lock().keys().cloned().collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.artifacts.lock().remove(key).is_some())
    }
}
