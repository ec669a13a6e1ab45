//! Filesystem staging store

use super::{ArtifactKey, StagingStore, not_found};
use crate::error::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Keeps artifacts as files, one subdirectory per [`ArtifactKey::namespace`].
///
/// Writes go to a hidden temporary sibling first and are renamed into place,
/// so readers only ever see complete artifacts.
#[derive(Debug)]
pub struct FsStagingStore {
    base_path: PathBuf,
}

impl FsStagingStore {
    /// # Errors
    ///
    /// Returns `Storage` if the directories cannot be created.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        for namespace in ArtifactKey::NAMESPACES {
            fs::create_dir_all(base_path.join(namespace))?;
        }
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn artifact_path(&self, key: &ArtifactKey) -> PathBuf {
        self.base_path.join(key.namespace()).join(key.storage_name())
    }

    fn temp_path(&self, key: &ArtifactKey) -> PathBuf {
        self.base_path.join(key.namespace()).join(format!(
            ".{}.{}.tmp",
            key.storage_name(),
            uuid::Uuid::new_v4().simple()
        ))
    }
}

impl StagingStore for FsStagingStore {
    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()> {
        let dest = self.artifact_path(key);
        let temp = self.temp_path(key);

        if let Err(e) = fs::write(&temp, bytes).and_then(|()| fs::rename(&temp, &dest)) {
            let _cleanup = fs::remove_file(&temp);
            return Err(e.into());
        }

        tracing::debug!(artifact = %key, path = %dest.display(), bytes = bytes.len(), "Stored artifact");
        Ok(())
    }

    fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>> {
        match fs::read(self.artifact_path(key)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.artifact_path(key).try_exists()?)
    }

    fn location(&self, key: &ArtifactKey) -> String {
        self.artifact_path(key).display().to_string()
    }
}
