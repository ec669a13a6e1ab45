//! In-process staging store

use super::{ArtifactKey, StagingStore, not_found};
use crate::error::{PreplineError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Keeps artifacts in a map. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStagingStore {
    artifacts: RwLock<HashMap<ArtifactKey, Vec<u8>>>,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> PreplineError {
    PreplineError::Storage("staging map lock poisoned".to_owned())
}

impl StagingStore for MemoryStagingStore {
    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()> {
        let mut artifacts = self.artifacts.write().map_err(|_poison| poisoned())?;
        artifacts.insert(key.clone(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>> {
        let artifacts = self.artifacts.read().map_err(|_poison| poisoned())?;
        artifacts.get(key).cloned().ok_or_else(|| not_found(key))
    }

    fn contains(&self, key: &ArtifactKey) -> Result<bool> {
        let artifacts = self.artifacts.read().map_err(|_poison| poisoned())?;
        Ok(artifacts.contains_key(key))
    }

    fn location(&self, key: &ArtifactKey) -> String {
        format!("memory://{}/{}", key.namespace(), key.storage_name())
    }
}
