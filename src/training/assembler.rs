//! Configuration assembler.
//!
//! Reads scalar hyperparameters, the indexed layer groups and the two callback
//! groups from [`FormFields`], builds a [`TrainingConfig`] and writes it to the
//! staging store under the request's identifier.

use super::config::{
    CallbackSettings, EarlyStopping, OptimizerSettings, ReduceLrOnPlateau, TrainingConfig,
};
use super::fields::{FormFields, parse_layers};
use crate::config::CallbackDefaults;
use crate::error::{PreplineError, Result};
use crate::staging::{ArtifactKey, StagingStore};
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::str::FromStr;

const DEFAULT_VALIDATION_SPLIT: f64 = 0.2;
const DEFAULT_MONITOR_FREQUENCY: u32 = 1;
const DEFAULT_DEVICE: &str = "cpu";

/// Split a comma-separated metric list, trimming and dropping empty pieces.
/// Order is kept and duplicates are not removed.
pub fn parse_custom_metrics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `shuffle` is on only for the literal `true`, in any case.
pub fn parse_shuffle(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Checkbox-style toggle: `true`, `on` or `1`.
pub fn parse_enabled(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("on") || raw == "1"
}

fn callback_key(group: &str, field: &str) -> String {
    format!("{group}[{field}]")
}

fn required_text(fields: &FormFields, key: &str) -> Result<String> {
    match fields.get(key).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_owned()),
        _ => Err(PreplineError::InvalidInput(format!(
            "missing required field '{key}'"
        ))),
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| PreplineError::invalid_field(key, raw, e.to_string()))
}

fn required_number<T>(fields: &FormFields, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = fields.get(key).filter(|raw| !raw.trim().is_empty()).ok_or_else(|| {
        PreplineError::InvalidInput(format!("missing required field '{key}'"))
    })?;
    parse_number(key, raw)
}

fn number_or<T>(fields: &FormFields, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match fields.get(key).filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => parse_number(key, raw),
        None => Ok(default),
    }
}

fn ensure(condition: bool, key: &str, value: impl Display, reason: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(PreplineError::invalid_field(key, value.to_string(), reason))
    }
}

/// Builds and stores training configurations.
#[derive(Debug)]
pub struct ConfigurationAssembler<'a> {
    store: &'a dyn StagingStore,
    defaults: &'a CallbackDefaults,
}

impl<'a> ConfigurationAssembler<'a> {
    pub fn new(store: &'a dyn StagingStore, defaults: &'a CallbackDefaults) -> Self {
        Self { store, defaults }
    }

    /// Build the configuration for the processed dataset of
    /// `identifier`/`filename` without writing anything.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the processed dataset is not staged
    /// - `InvalidInput` if a required scalar is missing
    /// - `InvalidFieldValue` if any field fails parsing or a range check
    pub fn assemble(
        &self,
        identifier: &str,
        filename: &str,
        fields: &FormFields,
        created_at: DateTime<Utc>,
    ) -> Result<TrainingConfig> {
        let dataset_key = ArtifactKey::processed(identifier, filename)?;
        if !self.store.contains(&dataset_key)? {
            return Err(PreplineError::NotFound(dataset_key.to_string()));
        }

        let learning_rate: f64 = required_number(fields, "learning_rate")?;
        ensure(
            learning_rate.is_finite() && learning_rate > 0.0,
            "learning_rate",
            learning_rate,
            "must be a positive number",
        )?;

        let epochs: u32 = required_number(fields, "epochs")?;
        ensure(epochs >= 1, "epochs", epochs, "must be at least 1")?;

        let batch_size: u32 = required_number(fields, "batch_size")?;
        ensure(batch_size >= 1, "batch_size", batch_size, "must be at least 1")?;

        let validation_split: f64 =
            number_or(fields, "validation_split", DEFAULT_VALIDATION_SPLIT)?;
        ensure(
            (0.0..1.0).contains(&validation_split),
            "validation_split",
            validation_split,
            "must be in [0, 1)",
        )?;

        let monitor_frequency: u32 =
            number_or(fields, "monitor_frequency", DEFAULT_MONITOR_FREQUENCY)?;
        ensure(
            monitor_frequency >= 1,
            "monitor_frequency",
            monitor_frequency,
            "must be at least 1",
        )?;

        let device = fields
            .get("device")
            .map(str::trim)
            .filter(|device| !device.is_empty())
            .unwrap_or(DEFAULT_DEVICE)
            .to_owned();

        Ok(TrainingConfig {
            identifier: identifier.to_owned(),
            dataset: self.store.location(&dataset_key),
            loss_function: required_text(fields, "loss_function")?,
            optimizer: OptimizerSettings {
                name: required_text(fields, "optimizer")?,
                learning_rate,
            },
            epochs,
            batch_size,
            validation_split,
            monitor_frequency,
            shuffle: fields.get("shuffle").is_some_and(parse_shuffle),
            device,
            metrics: collect_metrics(fields),
            custom_metrics: fields
                .get("custom_metrics")
                .map(parse_custom_metrics)
                .unwrap_or_default(),
            layers: parse_layers(fields)?,
            callbacks: self.parse_callbacks(fields)?,
            created_at,
        })
    }

    /// Assemble and write the configuration document.
    ///
    /// Returns the configuration and the location it was written to.
    ///
    /// # Errors
    ///
    /// Everything [`Self::assemble`] returns, plus `Storage` if the write fails.
    pub fn assemble_and_store(
        &self,
        identifier: &str,
        filename: &str,
        fields: &FormFields,
    ) -> Result<(TrainingConfig, String)> {
        let config = self.assemble(identifier, filename, fields, Utc::now())?;
        let key = ArtifactKey::configuration(identifier)?;
        self.store.put(&key, config.to_json()?.as_bytes())?;

        let location = self.store.location(&key);
        tracing::info!(
            identifier,
            layers = config.layers.len(),
            location = %location,
            "Stored training configuration"
        );
        Ok((config, location))
    }

    fn parse_callbacks(&self, fields: &FormFields) -> Result<CallbackSettings> {
        let defaults = self.defaults;

        let es = |field: &str| callback_key("early_stopping", field);
        let early_stopping = EarlyStopping {
            enabled: fields.get(&es("enabled")).is_some_and(parse_enabled),
            monitor: monitor_or(fields, &es("monitor"), &defaults.monitor),
            patience: number_or(fields, &es("patience"), defaults.patience)?,
            min_delta: number_or(fields, &es("min_delta"), defaults.min_delta)?,
        };
        ensure(
            early_stopping.min_delta.is_finite() && early_stopping.min_delta >= 0.0,
            &es("min_delta"),
            early_stopping.min_delta,
            "must be a non-negative number",
        )?;

        let lr = |field: &str| callback_key("reduce_lr", field);
        let reduce_lr = ReduceLrOnPlateau {
            enabled: fields.get(&lr("enabled")).is_some_and(parse_enabled),
            monitor: monitor_or(fields, &lr("monitor"), &defaults.monitor),
            factor: number_or(fields, &lr("factor"), defaults.factor)?,
            patience: number_or(fields, &lr("patience"), defaults.lr_patience)?,
            min_lr: number_or(fields, &lr("min_lr"), defaults.min_lr)?,
        };
        ensure(
            reduce_lr.factor > 0.0 && reduce_lr.factor < 1.0,
            &lr("factor"),
            reduce_lr.factor,
            "must be in (0, 1)",
        )?;
        ensure(
            reduce_lr.min_lr.is_finite() && reduce_lr.min_lr >= 0.0,
            &lr("min_lr"),
            reduce_lr.min_lr,
            "must be a non-negative number",
        )?;

        Ok(CallbackSettings {
            early_stopping,
            reduce_lr,
        })
    }
}

fn monitor_or(fields: &FormFields, key: &str, default: &str) -> String {
    fields
        .get(key)
        .map(str::trim)
        .filter(|monitor| !monitor.is_empty())
        .unwrap_or(default)
        .to_owned()
}

/// Repeated `metrics` fields, trimmed, first occurrence wins.
fn collect_metrics(fields: &FormFields) -> Vec<String> {
    let mut metrics: Vec<String> = Vec::new();
    for metric in fields.get_all("metrics").map(str::trim) {
        if !metric.is_empty() && !metrics.iter().any(|m| m == metric) {
            metrics.push(metric.to_owned());
        }
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::staging::MemoryStagingStore;
    use crate::training::config::LayerKind;

    const ID: &str = "9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d";
    const FILE: &str = "data.csv";

    fn staged_store() -> Result<MemoryStagingStore> {
        let store = MemoryStagingStore::new();
        store.put(&ArtifactKey::processed(ID, FILE)?, b"a\n1\n")?;
        Ok(store)
    }

    fn base_fields() -> FormFields {
        [
            ("loss_function", "mse"),
            ("optimizer", "adam"),
            ("learning_rate", "0.001"),
            ("epochs", "20"),
            ("batch_size", "32"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_custom_metrics_trim_and_drop_empty() {
        assert_eq!(parse_custom_metrics(" mae, , rmse "), vec!["mae", "rmse"]);
        assert_eq!(parse_custom_metrics("mae,mae"), vec!["mae", "mae"]);
        assert!(parse_custom_metrics("").is_empty());
    }

    #[test]
    fn test_shuffle_and_enabled_flags() {
        assert!(parse_shuffle("TRUE"));
        assert!(parse_shuffle("true"));
        assert!(!parse_shuffle("on"));
        assert!(!parse_shuffle("yes"));
        assert!(parse_enabled("on"));
        assert!(parse_enabled("1"));
        assert!(!parse_enabled("off"));
    }

    #[test]
    fn test_assembles_layers_and_defaults() -> Result<()> {
        let store = staged_store()?;
        let defaults = CallbackDefaults::default();
        let assembler = ConfigurationAssembler::new(&store, &defaults);

        let mut fields = base_fields();
        fields.extend([
            ("layers[0][type]", "dense"),
            ("layers[0][neurons]", "64"),
            ("layers[1][type]", "dropout"),
            ("layers[1][dropout_rate]", "0.3"),
            ("metrics", "accuracy"),
            ("metrics", "mae"),
            ("metrics", "accuracy"),
            ("custom_metrics", " f1, , auc "),
            ("shuffle", "True"),
        ]);

        let config = assembler.assemble(ID, FILE, &fields, Utc::now())?;

        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.layers[0].kind, LayerKind::Dense);
        assert_eq!(config.layers[0].neurons, Some(64));
        assert_eq!(config.layers[1].dropout_rate, Some(0.3));
        assert_eq!(config.layers[1].activation, "");
        assert_eq!(config.metrics, vec!["accuracy", "mae"]);
        assert_eq!(config.custom_metrics, vec!["f1", "auc"]);
        assert!(config.shuffle);
        assert_eq!(config.device, "cpu");
        assert_eq!(config.optimizer.name, "adam");
        assert_eq!(
            config.dataset,
            format!("memory://processed/processed_{ID}_data.csv")
        );

        let es = &config.callbacks.early_stopping;
        assert!(!es.enabled);
        assert_eq!(es.patience, 5);
        assert!((es.min_delta - 0.001).abs() < f64::EPSILON);
        let lr = &config.callbacks.reduce_lr;
        assert!(!lr.enabled);
        assert_eq!(lr.patience, 3);
        assert!((lr.factor - 0.1).abs() < f64::EPSILON);
        assert!((lr.min_lr - 0.000_01).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_callback_overrides() -> Result<()> {
        let store = staged_store()?;
        let defaults = CallbackDefaults::default();
        let assembler = ConfigurationAssembler::new(&store, &defaults);

        let mut fields = base_fields();
        fields.extend([
            ("early_stopping[enabled]", "on"),
            ("early_stopping[patience]", "8"),
            ("early_stopping[monitor]", "val_accuracy"),
            ("reduce_lr[enabled]", "true"),
            ("reduce_lr[factor]", "0.5"),
        ]);

        let callbacks = assembler.assemble(ID, FILE, &fields, Utc::now())?.callbacks;
        assert!(callbacks.early_stopping.enabled);
        assert_eq!(callbacks.early_stopping.patience, 8);
        assert_eq!(callbacks.early_stopping.monitor, "val_accuracy");
        assert!(callbacks.reduce_lr.enabled);
        assert!((callbacks.reduce_lr.factor - 0.5).abs() < f64::EPSILON);
        assert_eq!(callbacks.reduce_lr.monitor, "val_loss");
        Ok(())
    }

    #[test]
    fn test_missing_processed_dataset_is_not_found() {
        let store = MemoryStagingStore::new();
        let defaults = CallbackDefaults::default();
        let assembler = ConfigurationAssembler::new(&store, &defaults);

        let err = assembler
            .assemble(ID, FILE, &base_fields(), Utc::now())
            .expect_err("nothing staged");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_scalar_validation() -> Result<()> {
        let store = staged_store()?;
        let defaults = CallbackDefaults::default();
        let assembler = ConfigurationAssembler::new(&store, &defaults);

        let mut missing = FormFields::new();
        missing.extend(base_fields().iter().filter(|(k, _)| *k != "epochs"));
        let err = assembler
            .assemble(ID, FILE, &missing, Utc::now())
            .expect_err("epochs missing");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        for (key, value) in [
            ("epochs", "ten"),
            ("epochs", "0"),
            ("learning_rate", "-1"),
            ("validation_split", "1.5"),
            ("reduce_lr[factor]", "2"),
        ] {
            let mut fields: FormFields = base_fields()
                .iter()
                .filter(|(k, _)| *k != key)
                .collect();
            fields.push(key, value);
            let err = assembler
                .assemble(ID, FILE, &fields, Utc::now())
                .expect_err("invalid scalar");
            assert_eq!(err.kind(), ErrorKind::InvalidFieldValue, "{key}={value}");
        }
        Ok(())
    }

    #[test]
    fn test_assemble_and_store_writes_document() -> Result<()> {
        let store = staged_store()?;
        let defaults = CallbackDefaults::default();
        let assembler = ConfigurationAssembler::new(&store, &defaults);

        let (config, location) = assembler.assemble_and_store(ID, FILE, &base_fields())?;
        assert_eq!(
            location,
            format!("memory://configurations/{ID}_training_config.json")
        );

        let stored = store.get(&ArtifactKey::configuration(ID)?)?;
        let parsed = TrainingConfig::from_json(&String::from_utf8_lossy(&stored))?;
        assert_eq!(parsed, config);
        Ok(())
    }
}
