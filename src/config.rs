//! Application configuration.
//!
//! Settings live in a JSON file. A missing file means defaults; a file that
//! exists but does not parse is rejected so a typo never silently resets the
//! staging directory.

use crate::error::{PreplineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PREPLINE_CONFIG";
/// Environment variable overriding [`AppConfig::staging_dir`].
pub const STAGING_DIR_ENV: &str = "PREPLINE_STAGING_DIR";

pub const DEFAULT_STAGING_DIR: &str = "temp_files";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding raw, processed and configuration artifacts
    pub staging_dir: PathBuf,
    /// Directory for rolling log files. `None` uses the platform data dir.
    pub log_dir: Option<PathBuf>,
    pub pipeline: PipelineSettings,
    pub callbacks: CallbackDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            log_dir: None,
            pipeline: PipelineSettings::default(),
            callbacks: CallbackDefaults::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineSettings {
    /// String columns with fewer distinct values than this are label-encoded
    pub categorical_threshold: usize,
    /// Rows sampled by the CSV reader for dtype inference
    pub infer_schema_rows: usize,
    /// Accepted upload extensions, compared case-insensitively
    pub allowed_extensions: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            categorical_threshold: 50,
            infer_schema_rows: 10_000,
            allowed_extensions: vec!["csv".to_owned()],
        }
    }
}

impl PipelineSettings {
    pub fn accepts_filename(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

/// Values used when a callback field is absent from the submitted form.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CallbackDefaults {
    pub monitor: String,
    pub patience: u32,
    pub min_delta: f64,
    pub factor: f64,
    pub lr_patience: u32,
    pub min_lr: f64,
}

impl Default for CallbackDefaults {
    fn default() -> Self {
        Self {
            monitor: "val_loss".to_owned(),
            patience: 5,
            min_delta: 0.001,
            factor: 0.1,
            lr_patience: 3,
            min_lr: 0.000_01,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist. [`STAGING_DIR_ENV`] is applied last.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the file exists but is not valid JSON for
    /// this schema, `Storage` if it cannot be read.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                serde_json::from_str::<Self>(&content).map_err(|e| {
                    PreplineError::InvalidInput(format!(
                        "config file {} is invalid: {e}",
                        path.display()
                    ))
                })?
            }
            _ => Self::default(),
        };

        if let Some(dir) = std::env::var_os(STAGING_DIR_ENV) {
            config.staging_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Save configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
