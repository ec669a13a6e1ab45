//! Flat form fields and the indexed layer parser.
//!
//! Layers are submitted as `layers[<index>][<field>]` keys. There is no count
//! field: parsing starts at index 0 and stops at the first index without a
//! `type` key. Indices must therefore be contiguous; a gap silently ends the
//! list.

use super::config::{LayerKind, LayerSpec};
use crate::error::{PreplineError, Result};
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

/// Fields of one layer group, besides `type`.
const LAYER_FIELDS: [&str; 4] = ["neurons", "activation", "kernel_size", "dropout_rate"];

/// Ordered multimap of submitted `key=value` pairs.
///
/// Keys may repeat (e.g. `metrics`); single-valued lookups take the first
/// occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    entries: Vec<(String, String)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse one `key=value` pair, splitting on the first `=`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if there is no `=` or the key is empty.
    pub fn parse_pair(pair: &str) -> Result<(String, String)> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_owned(), value.to_owned()))
            }
            _ => Err(PreplineError::InvalidInput(format!(
                "expected KEY=VALUE, got {pair:?}"
            ))),
        }
    }

    /// Build from a JSON object. Strings, numbers and booleans become one
    /// field each; arrays become repeated fields.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `value` is not an object or holds nested
    /// objects.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(PreplineError::InvalidInput(
                "form fields must be a JSON object".to_owned(),
            ));
        };

        let mut fields = Self::new();
        for (key, value) in map {
            match value {
                Value::Array(items) => {
                    for item in items {
                        fields.push(key.clone(), json_scalar(key, item)?);
                    }
                }
                other => fields.push(key.clone(), json_scalar(key, other)?),
            }
        }
        Ok(fields)
    }
}

fn json_scalar(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(PreplineError::InvalidInput(format!(
            "field {key:?} must hold a scalar or a list of scalars"
        ))),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        fields.extend(iter);
        fields
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for FormFields {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.push(key, value);
        }
    }
}

pub fn layer_key(index: usize, field: &str) -> String {
    format!("layers[{index}][{field}]")
}

/// Parse `layers[index]`, or `None` when that index carries no `type`.
///
/// # Errors
///
/// Returns `InvalidFieldValue` naming the index and field when:
/// - `type` is absent but another field of the same index is present,
/// - `type` is empty or not a known layer type,
/// - a non-empty `neurons` or `dropout_rate` is not a valid number.
pub fn parse_layer(fields: &FormFields, index: usize) -> Result<Option<LayerSpec>> {
    let Some(raw_type) = fields.get(&layer_key(index, "type")) else {
        if let Some(field) = LAYER_FIELDS
            .iter()
            .find(|field| fields.contains(&layer_key(index, field)))
        {
            return Err(PreplineError::invalid_layer_field(
                index,
                "type",
                "",
                format!("missing while layers[{index}][{field}] is present"),
            ));
        }
        return Ok(None);
    };

    if raw_type.trim().is_empty() {
        return Err(PreplineError::invalid_layer_field(
            index,
            "type",
            raw_type,
            "must not be empty",
        ));
    }
    let kind = raw_type
        .parse::<LayerKind>()
        .map_err(|reason| PreplineError::invalid_layer_field(index, "type", raw_type, reason))?;

    let dropout_rate = optional_number::<f64>(fields, index, "dropout_rate")?;
    if let Some(rate) = dropout_rate
        && !rate.is_finite()
    {
        return Err(PreplineError::invalid_layer_field(
            index,
            "dropout_rate",
            rate.to_string(),
            "must be a finite number",
        ));
    }

    Ok(Some(LayerSpec {
        kind,
        neurons: optional_number::<u32>(fields, index, "neurons")?,
        activation: text_or_empty(fields, index, "activation"),
        kernel_size: text_or_empty(fields, index, "kernel_size"),
        dropout_rate,
    }))
}

/// Rebuild the ordered layer list, stopping at the first missing index.
///
/// # Errors
///
/// Propagates the first [`parse_layer`] failure.
pub fn parse_layers(fields: &FormFields) -> Result<Vec<LayerSpec>> {
    let mut layers = Vec::new();
    while let Some(layer) = parse_layer(fields, layers.len())? {
        layers.push(layer);
    }
    Ok(layers)
}

fn optional_number<T>(fields: &FormFields, index: usize, field: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = fields.get(&layer_key(index, field)) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|e| PreplineError::invalid_layer_field(index, field, raw, e.to_string()))
}

fn text_or_empty(fields: &FormFields, index: usize, field: &str) -> String {
    fields
        .get(&layer_key(index, field))
        .map(|value| value.trim().to_owned())
        .unwrap_or_default()
}
