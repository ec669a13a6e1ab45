//! Training configuration document.
//!
//! Serialized as pretty JSON and written once per training request. A
//! downstream trainer reads it; nothing in this crate mutates it afterwards.

use crate::error::{PreplineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Layer type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Dense,
    Dropout,
    Conv1D,
    Conv2D,
    MaxPooling1D,
    MaxPooling2D,
    Flatten,
    Lstm,
    Gru,
    BatchNormalization,
}

impl LayerKind {
    pub const ALL: [Self; 10] = [
        Self::Dense,
        Self::Dropout,
        Self::Conv1D,
        Self::Conv2D,
        Self::MaxPooling1D,
        Self::MaxPooling2D,
        Self::Flatten,
        Self::Lstm,
        Self::Gru,
        Self::BatchNormalization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Dropout => "dropout",
            Self::Conv1D => "conv1d",
            Self::Conv2D => "conv2d",
            Self::MaxPooling1D => "maxpooling1d",
            Self::MaxPooling2D => "maxpooling2d",
            Self::Flatten => "flatten",
            Self::Lstm => "lstm",
            Self::Gru => "gru",
            Self::BatchNormalization => "batchnormalization",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(Self::as_str).collect();
                format!("unknown layer type, expected one of: {}", known.join(", "))
            })
    }
}

/// One layer, in forward order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub neurons: Option<u32>,
    pub activation: String,
    pub kernel_size: String,
    pub dropout_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub name: String,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStopping {
    pub enabled: bool,
    pub monitor: String,
    pub patience: u32,
    pub min_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceLrOnPlateau {
    pub enabled: bool,
    pub monitor: String,
    pub factor: f64,
    pub patience: u32,
    pub min_lr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackSettings {
    pub early_stopping: EarlyStopping,
    pub reduce_lr: ReduceLrOnPlateau,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub identifier: String,
    /// Location of the processed dataset this configuration trains on
    pub dataset: String,
    pub loss_function: String,
    pub optimizer: OptimizerSettings,
    pub epochs: u32,
    pub batch_size: u32,
    pub validation_split: f64,
    /// Report progress every N epochs
    pub monitor_frequency: u32,
    pub shuffle: bool,
    pub device: String,
    pub metrics: Vec<String>,
    pub custom_metrics: Vec<String>,
    pub layers: Vec<LayerSpec>,
    pub callbacks: CallbackSettings,
    pub created_at: DateTime<Utc>,
}

impl TrainingConfig {
    /// # Errors
    ///
    /// Returns `Internal` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PreplineError::Internal(format!("Failed to serialize configuration: {e}")))
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` if `json` is not a configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_kind_parses_case_insensitively() {
        assert_eq!("Dense".parse::<LayerKind>(), Ok(LayerKind::Dense));
        assert_eq!(" conv2D ".parse::<LayerKind>(), Ok(LayerKind::Conv2D));
        assert_eq!(
            "BatchNormalization".parse::<LayerKind>(),
            Ok(LayerKind::BatchNormalization)
        );
        assert!("attention".parse::<LayerKind>().is_err());
    }

    #[test]
    fn test_layer_kind_serializes_as_lowercase_tag() -> serde_json::Result<()> {
        for kind in LayerKind::ALL {
            assert_eq!(serde_json::to_value(kind)?, kind.as_str());
        }
        Ok(())
    }

    #[test]
    fn test_layer_spec_uses_type_key() -> serde_json::Result<()> {
        let layer = LayerSpec {
            kind: LayerKind::Dropout,
            neurons: None,
            activation: String::new(),
            kernel_size: String::new(),
            dropout_rate: Some(0.3),
        };
        let json = serde_json::to_value(&layer)?;
        assert_eq!(json["type"], "dropout");
        assert!(json["neurons"].is_null());
        assert_eq!(json["activation"], "");
        Ok(())
    }
}
