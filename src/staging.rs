//! Staging store for uploaded, processed and configuration artifacts
//!
//! Artifacts are addressed by an [`ArtifactKey`]: the client-visible
//! identifier (a hyphenated UUID) plus the stage, and for table stages the
//! original filename. Each kind of artifact lives in its own namespace, so a
//! key of one kind can never name an artifact of another. Nothing is mutated
//! in place; each stage writes its own artifact.
//!
//! Stores are shared between concurrent requests. A `put` on an existing key
//! overwrites it (last write wins) and stores do no locking per identifier,
//! so two concurrent transforms of the same identifier race.

mod fs;
mod memory;

pub use fs::FsStagingStore;
pub use memory::MemoryStagingStore;

use crate::error::{PreplineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pipeline stage of a table artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Bytes exactly as uploaded
    Raw,
    /// Output of the transform pipeline
    Processed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Processed => "processed",
        }
    }
}

/// Address of one artifact in a [`StagingStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    Table {
        identifier: String,
        stage: Stage,
        filename: String,
    },
    Configuration {
        identifier: String,
    },
}

impl ArtifactKey {
    /// Namespaces used by [`ArtifactKey::namespace`].
    pub const NAMESPACES: [&'static str; 3] = ["raw", "processed", "configurations"];

    /// Key of an uploaded table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the identifier is not a hyphenated UUID or the
    /// filename is not a single path component.
    pub fn raw(identifier: &str, filename: &str) -> Result<Self> {
        Self::table(identifier, Stage::Raw, filename)
    }

    /// Key of a transformed table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the identifier is not a hyphenated UUID or the
    /// filename is not a single path component.
    pub fn processed(identifier: &str, filename: &str) -> Result<Self> {
        Self::table(identifier, Stage::Processed, filename)
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` if the identifier is not a hyphenated UUID or the
    /// filename is not a single path component.
    pub fn table(identifier: &str, stage: Stage, filename: &str) -> Result<Self> {
        validate_identifier(identifier)?;
        validate_component("filename", filename)?;
        Ok(Self::Table {
            identifier: identifier.to_owned(),
            stage,
            filename: filename.to_owned(),
        })
    }

    /// Key of the training configuration document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the identifier is not a hyphenated UUID.
    pub fn configuration(identifier: &str) -> Result<Self> {
        validate_identifier(identifier)?;
        Ok(Self::Configuration {
            identifier: identifier.to_owned(),
        })
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Table { identifier, .. } | Self::Configuration { identifier } => identifier,
        }
    }

    /// Namespace holding every artifact of this key's kind.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Table {
                stage: Stage::Raw, ..
            } => Self::NAMESPACES[0],
            Self::Table {
                stage: Stage::Processed,
                ..
            } => Self::NAMESPACES[1],
            Self::Configuration { .. } => Self::NAMESPACES[2],
        }
    }

    /// Name of the artifact within its [`namespace`](Self::namespace).
    ///
    /// Unique per namespace because identifiers have a fixed length.
    pub fn storage_name(&self) -> String {
        match self {
            Self::Table {
                identifier,
                stage: Stage::Raw,
                filename,
            } => format!("{identifier}_{filename}"),
            Self::Table {
                identifier,
                stage: Stage::Processed,
                filename,
            } => format!("processed_{identifier}_{filename}"),
            Self::Configuration { identifier } => format!("{identifier}_training_config.json"),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table { stage, .. } => {
                write!(f, "{} artifact '{}'", stage.as_str(), self.storage_name())
            }
            Self::Configuration { .. } => {
                write!(f, "configuration '{}'", self.storage_name())
            }
        }
    }
}

/// Identifiers are issued by ingest and must be canonical hyphenated UUIDs.
fn validate_identifier(value: &str) -> Result<()> {
    match Uuid::parse_str(value) {
        Ok(parsed) if parsed.hyphenated().to_string() == value => Ok(()),
        _ => Err(PreplineError::InvalidInput(format!(
            "identifier {value:?} is not a valid upload identifier"
        ))),
    }
}

/// Reject anything that could escape the staging area.
fn validate_component(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PreplineError::InvalidInput(format!("{what} must not be empty")));
    }
    if value.contains(['/', '\\', '\0']) || value == "." || value == ".." || value.contains("..")
    {
        return Err(PreplineError::InvalidInput(format!(
            "{what} {value:?} must be a plain name"
        )));
    }
    Ok(())
}

/// Key-to-bytes storage shared by all requests.
///
/// Reads and writes are synchronous and never retried: a missing artifact is
/// `NotFound`, any other failure is `Storage`.
pub trait StagingStore: Send + Sync + fmt::Debug {
    /// Store `bytes` under `key`, replacing any previous artifact.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the write fails. A failed write leaves no partial
    /// artifact behind.
    fn put(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<()>;

    /// Fetch the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing is stored under `key`, `Storage` on any
    /// other failure.
    fn get(&self, key: &ArtifactKey) -> Result<Vec<u8>>;

    /// # Errors
    ///
    /// Returns `Storage` if existence cannot be determined.
    fn contains(&self, key: &ArtifactKey) -> Result<bool>;

    /// Human-readable location of `key`, reported back to clients.
    fn location(&self, key: &ArtifactKey) -> String;
}

pub(crate) fn not_found(key: &ArtifactKey) -> PreplineError {
    PreplineError::NotFound(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const ID: &str = "3f2c1a9e-8b7d-4c6e-9f01-23456789abcd";

    #[test]
    fn test_storage_names_and_namespaces() -> Result<()> {
        let raw = ArtifactKey::raw(ID, "data.csv")?;
        assert_eq!(raw.storage_name(), format!("{ID}_data.csv"));
        assert_eq!(raw.namespace(), "raw");

        let processed = ArtifactKey::processed(ID, "data.csv")?;
        assert_eq!(processed.storage_name(), format!("processed_{ID}_data.csv"));
        assert_eq!(processed.namespace(), "processed");

        let config = ArtifactKey::configuration(ID)?;
        assert_eq!(config.storage_name(), format!("{ID}_training_config.json"));
        assert_eq!(config.namespace(), "configurations");
        Ok(())
    }

    #[test]
    fn test_rejects_path_like_filenames() {
        for bad in ["", "  ", "../etc", "a/b", "a\\b", ".."] {
            let err = ArtifactKey::raw(ID, bad).expect_err("filename must be rejected");
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{bad:?}");
        }
    }

    #[test]
    fn test_identifier_must_be_canonical_uuid() {
        let upper = ID.to_uppercase();
        let simple = ID.replace('-', "");
        for bad in ["", "abc", "processed", "../etc", upper.as_str(), simple.as_str()] {
            let err = ArtifactKey::raw(bad, "data.csv").expect_err("identifier must be rejected");
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{bad:?}");
            assert!(ArtifactKey::configuration(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_raw_key_cannot_alias_processed_artifact() -> Result<()> {
        // `processed_{ID}_d.csv` spelled as a raw key would need the
        // identifier "processed".
        assert!(ArtifactKey::raw("processed", &format!("{ID}_d.csv")).is_err());

        let raw = ArtifactKey::raw(ID, "training_config.json")?;
        let config = ArtifactKey::configuration(ID)?;
        assert_eq!(raw.storage_name(), config.storage_name());
        assert_ne!(raw.namespace(), config.namespace());
        Ok(())
    }

    #[test]
    fn test_display_names_stage() -> Result<()> {
        let key = ArtifactKey::processed(ID, "data.csv")?;
        assert_eq!(
            key.to_string(),
            format!("processed artifact 'processed_{ID}_data.csv'")
        );
        assert_eq!(key.identifier(), ID);
        Ok(())
    }
}
