//! Request boundary: ingest, transform and configure.
//!
//! Each operation takes and returns plain serde payloads, so any transport
//! (HTTP handler, CLI, message consumer) can sit in front of it. Work runs on
//! the blocking thread pool; the only state shared between requests is the
//! staging store.

use crate::config::{AppConfig, CallbackDefaults, PipelineSettings};
use crate::dataset::transforms::ProfiledFrame;
use crate::dataset::{
    SchemaSummary, TransformPipeline, TransformReport, profile, read_csv_bytes, summarize,
    write_csv_bytes,
};
use crate::error::{PreplineError, Result};
use crate::staging::{ArtifactKey, FsStagingStore, StagingStore};
use crate::training::{ConfigurationAssembler, FormFields};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const CONFIRMATION_PROMPT: &str = "Please review the summary above and confirm. \
After confirmation the dataset will be processed and returned to you.";

/// Prefix marking a file as pipeline output.
pub const PROCESSED_PREFIX: &str = "processed_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestResponse {
    pub identifier: String,
    pub filename: String,
    pub summary: SchemaSummary,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformRequest {
    pub identifier: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformResponse {
    pub identifier: String,
    /// Download name of the processed table
    pub filename: String,
    pub location: String,
    pub report: TransformReport,
    /// Processed table, same delimited-text encoding as the upload
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub identifier: String,
    pub filename: String,
    pub fields: FormFields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigureResponse {
    pub status: String,
    pub identifier: String,
    pub config_path: String,
    pub message: String,
}

/// Validate, profile and stage an upload under a fresh identifier.
///
/// # Errors
///
/// - `InvalidInput` for an unsupported extension or unsafe filename
/// - `MalformedInput` if the payload is not a well-formed table
/// - `Storage` if the raw artifact cannot be written
pub fn ingest_dataset(
    store: &dyn StagingStore,
    settings: &PipelineSettings,
    filename: &str,
    bytes: &[u8],
) -> Result<IngestResponse> {
    if !settings.accepts_filename(filename) {
        tracing::warn!(filename, "Rejected upload with unsupported extension");
        return Err(PreplineError::InvalidInput(format!(
            "only {} files are supported, got '{filename}'",
            settings.allowed_extensions.join("/")
        )));
    }

    let df = read_csv_bytes(bytes, settings.infer_schema_rows).map_err(|e| {
        tracing::warn!(filename, error = %e, "Rejected unreadable upload");
        e
    })?;
    let profiles = profile(&df, settings.categorical_threshold)?;
    let summary = summarize(&profiles, df.height());

    let identifier = Uuid::new_v4().to_string();
    let key = ArtifactKey::raw(&identifier, filename)?;
    store.put(&key, bytes)?;

    tracing::info!(
        identifier = %identifier,
        filename,
        rows = summary.row_count,
        columns = summary.column_count,
        "Staged upload"
    );

    Ok(IngestResponse {
        identifier,
        filename: filename.to_owned(),
        summary,
        message: CONFIRMATION_PROMPT.to_owned(),
    })
}

/// Run the cleaning pipeline on a staged upload and stage the result.
///
/// # Errors
///
/// - `InvalidInput` if the identifier was not issued by ingest
/// - `NotFound` if no raw artifact exists for the request
/// - `MalformedInput` if the raw bytes no longer parse
/// - `Storage` if the processed artifact cannot be written
pub fn transform_dataset(
    store: &dyn StagingStore,
    settings: &PipelineSettings,
    request: &TransformRequest,
) -> Result<TransformResponse> {
    let raw_key = ArtifactKey::raw(&request.identifier, &request.filename)?;
    let raw = store.get(&raw_key)?;

    let df = read_csv_bytes(&raw, settings.infer_schema_rows)?;
    let profiles = profile(&df, settings.categorical_threshold)?;
    let (mut frame, report) = TransformPipeline::standard().apply(ProfiledFrame::new(df, profiles))?;
    let bytes = write_csv_bytes(&mut frame.df)?;

    let processed_key = ArtifactKey::processed(&request.identifier, &request.filename)?;
    store.put(&processed_key, &bytes)?;

    tracing::info!(
        identifier = %request.identifier,
        input_rows = report.input_rows,
        output_rows = report.output_rows,
        "Processed dataset"
    );

    Ok(TransformResponse {
        identifier: request.identifier.clone(),
        filename: format!("{PROCESSED_PREFIX}{}", request.filename),
        location: store.location(&processed_key),
        report,
        bytes,
    })
}

/// Assemble and store the training configuration for a processed dataset.
///
/// # Errors
///
/// See [`ConfigurationAssembler::assemble`]; additionally `Storage` if the
/// document cannot be written.
pub fn configure_training(
    store: &dyn StagingStore,
    defaults: &CallbackDefaults,
    request: &ConfigureRequest,
) -> Result<ConfigureResponse> {
    let assembler = ConfigurationAssembler::new(store, defaults);
    let (config, location) =
        assembler.assemble_and_store(&request.identifier, &request.filename, &request.fields)?;

    Ok(ConfigureResponse {
        status: "success".to_owned(),
        identifier: config.identifier,
        config_path: location,
        message: format!(
            "Training configuration with {} layer(s) saved. Training can be started with this configuration.",
            config.layers.len()
        ),
    })
}

/// Async front over the three operations, sharing one staging store.
#[derive(Debug, Clone)]
pub struct Service {
    store: Arc<dyn StagingStore>,
    config: Arc<AppConfig>,
}

impl Service {
    pub fn new(store: Arc<dyn StagingStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Service backed by a filesystem store at `config.staging_dir`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the staging directory cannot be created.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = FsStagingStore::new(config.staging_dir.clone())?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn store(&self) -> &Arc<dyn StagingStore> {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// # Errors
    ///
    /// See [`ingest_dataset`].
    pub async fn ingest(&self, filename: String, bytes: Vec<u8>) -> Result<IngestResponse> {
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        run_blocking("ingest", move || {
            ingest_dataset(store.as_ref(), &config.pipeline, &filename, &bytes)
        })
        .await
    }

    /// # Errors
    ///
    /// See [`transform_dataset`].
    pub async fn transform(&self, request: TransformRequest) -> Result<TransformResponse> {
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        run_blocking("transform", move || {
            transform_dataset(store.as_ref(), &config.pipeline, &request)
        })
        .await
    }

    /// # Errors
    ///
    /// See [`configure_training`].
    pub async fn configure(&self, request: ConfigureRequest) -> Result<ConfigureResponse> {
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        run_blocking("configure", move || {
            configure_training(store.as_ref(), &config.callbacks, &request)
        })
        .await
    }
}

async fn run_blocking<F, R>(name: &'static str, f: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PreplineError::Internal(format!("{name} worker failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::staging::MemoryStagingStore;

    fn settings() -> PipelineSettings {
        PipelineSettings::default()
    }

    #[test]
    fn test_ingest_rejects_non_csv() {
        let store = MemoryStagingStore::new();
        let err = ingest_dataset(&store, &settings(), "data.xlsx", b"a\n1\n")
            .expect_err("xlsx is not accepted");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(store.is_empty());
    }

    #[test]
    fn test_ingest_rejects_malformed_payload_without_staging() {
        let store = MemoryStagingStore::new();
        let err = ingest_dataset(&store, &settings(), "data.csv", b"")
            .expect_err("empty payload");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(store.is_empty());
    }

    #[test]
    fn test_ingest_stages_raw_bytes() -> Result<()> {
        let store = MemoryStagingStore::new();
        let payload = b"a,b\n1,x\n2,y\n";
        let response = ingest_dataset(&store, &settings(), "data.csv", payload)?;

        assert_eq!(response.filename, "data.csv");
        assert_eq!(response.summary.columns, vec!["a", "b"]);
        assert_eq!(response.message, CONFIRMATION_PROMPT);
        let key = ArtifactKey::raw(&response.identifier, "data.csv")?;
        assert_eq!(store.get(&key)?, payload);
        Ok(())
    }

    #[test]
    fn test_transform_unknown_identifier_is_not_found() {
        let store = MemoryStagingStore::new();
        let request = TransformRequest {
            identifier: Uuid::new_v4().to_string(),
            filename: "data.csv".to_owned(),
        };
        let err = transform_dataset(&store, &settings(), &request).expect_err("nothing staged");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_transform_rejects_foreign_identifier() {
        let store = MemoryStagingStore::new();
        let request = TransformRequest {
            identifier: "processed".to_owned(),
            filename: "data.csv".to_owned(),
        };
        let err = transform_dataset(&store, &settings(), &request).expect_err("not an upload id");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_transform_writes_processed_artifact() -> Result<()> {
        let store = MemoryStagingStore::new();
        let ingest = ingest_dataset(&store, &settings(), "data.csv", b"k,v\na,1\na,1\n")?;
        let request = TransformRequest {
            identifier: ingest.identifier.clone(),
            filename: "data.csv".to_owned(),
        };

        let response = transform_dataset(&store, &settings(), &request)?;

        assert_eq!(response.filename, "processed_data.csv");
        assert_eq!(response.report.output_rows, 1);
        let stored = store.get(&ArtifactKey::processed(&ingest.identifier, "data.csv")?)?;
        assert_eq!(stored, response.bytes);
        assert_eq!(String::from_utf8_lossy(&stored), "k,v\n0,1\n");
        Ok(())
    }
}
