//! Transform trait and the fixed cleaning pipeline
//!
//! The standard pipeline runs four steps in this order:
//!
//! 1. [`BooleanCoercion`]: `"True"`/`"False"` columns become `1`/`0`
//! 2. [`CategoricalEncoding`]: low-cardinality text becomes integer codes,
//!    missing cells become `-1`
//! 3. [`ForwardFill`]: missing cells take the previous value in the column
//! 4. [`DropDuplicates`]: repeated rows are removed, first occurrence kept
//!
//! The order matters: encoding must not see boolean columns, and duplicate
//! detection must compare filled, encoded rows.

use super::profiler::{ColumnKind, ColumnProfile, TRUE_TOKEN, distinct_text_values};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A table together with the column kinds it was profiled with.
///
/// Steps that rewrite a column also update its profile, so later steps see
/// the column's new kind.
#[derive(Debug, Clone)]
pub struct ProfiledFrame {
    pub df: DataFrame,
    pub profiles: Vec<ColumnProfile>,
}

impl ProfiledFrame {
    pub fn new(df: DataFrame, profiles: Vec<ColumnProfile>) -> Self {
        Self { df, profiles }
    }
}

/// One deterministic step of the pipeline.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Apply this step in place and return how many columns, cells or rows
    /// it changed (see [`Transform::description`] for the unit).
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if a column cannot be read as its profiled kind.
    fn apply(&self, frame: &mut ProfiledFrame) -> Result<usize>;

    fn name(&self) -> &'static str;

    fn description(&self) -> String;
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub description: String,
    pub affected: usize,
}

/// Summary of a whole pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub steps: Vec<StepOutcome>,
}

/// Ordered sequence of transforms applied one after another.
#[derive(Debug)]
pub struct TransformPipeline {
    steps: Vec<Box<dyn Transform>>,
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl TransformPipeline {
    /// The fixed cleaning sequence.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(BooleanCoercion),
            Box::new(CategoricalEncoding),
            Box::new(ForwardFill),
            Box::new(DropDuplicates),
        ])
    }

    pub fn new(steps: Vec<Box<dyn Transform>>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Run every step in order on an owned frame.
    ///
    /// Either all steps succeed and the finished frame is returned, or the
    /// first error is returned and nothing is produced.
    ///
    /// # Errors
    ///
    /// Propagates the first step failure.
    pub fn apply(&self, mut frame: ProfiledFrame) -> Result<(ProfiledFrame, TransformReport)> {
        let input_rows = frame.df.height();
        let mut outcomes = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let affected = step.apply(&mut frame)?;
            tracing::debug!(step = step.name(), affected, "Applied transform");
            outcomes.push(StepOutcome {
                step: step.name().to_owned(),
                description: step.description(),
                affected,
            });
        }

        let report = TransformReport {
            input_rows,
            output_rows: frame.df.height(),
            steps: outcomes,
        };
        Ok((frame, report))
    }
}

// ============================================================================
// Concrete Transform Implementations
// ============================================================================

/// Maps boolean-like columns to integer `1`/`0`.
///
/// A column qualifies only when every non-missing value is exactly `"True"`
/// or `"False"`. Missing cells stay missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCoercion;

impl Transform for BooleanCoercion {
    fn apply(&self, frame: &mut ProfiledFrame) -> Result<usize> {
        let mut changed = 0;

        for profile in &mut frame.profiles {
            if profile.kind != ColumnKind::BooleanLike {
                continue;
            }

            let coerced = {
                let series = frame.df.column(&profile.name)?.as_materialized_series();
                let values: Vec<Option<i64>> = series
                    .str()?
                    .into_iter()
                    .map(|value| value.map(|token| i64::from(token == TRUE_TOKEN)))
                    .collect();
                Series::new(series.name().clone(), values)
            };

            profile.declared_type = coerced.dtype().to_string();
            profile.kind = ColumnKind::Numeric;
            frame.df.with_column(coerced)?;
            changed += 1;
        }

        Ok(changed)
    }

    fn name(&self) -> &'static str {
        "boolean_coercion"
    }

    fn description(&self) -> String {
        "Map True/False columns to 1/0 (columns changed)".to_owned()
    }
}

/// Replaces low-cardinality text with integer codes.
///
/// Codes follow ascending byte order of the distinct non-missing values, so
/// identical input always yields identical codes. Missing cells get
/// [`MISSING_CATEGORY_CODE`], which later steps treat as an ordinary value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoricalEncoding;

/// Code given to a missing cell in an encoded column.
pub const MISSING_CATEGORY_CODE: i64 = -1;

impl Transform for CategoricalEncoding {
    fn apply(&self, frame: &mut ProfiledFrame) -> Result<usize> {
        let mut changed = 0;

        for profile in &mut frame.profiles {
            if profile.kind != ColumnKind::Categorical {
                continue;
            }

            let encoded = {
                let series = frame.df.column(&profile.name)?.as_materialized_series();
                let codes: HashMap<&str, i64> = distinct_text_values(series)?
                    .into_iter()
                    .zip(0_i64..)
                    .collect();
                let values: Vec<i64> = series
                    .str()?
                    .into_iter()
                    .map(|value| {
                        value
                            .and_then(|v| codes.get(v).copied())
                            .unwrap_or(MISSING_CATEGORY_CODE)
                    })
                    .collect();
                Series::new(series.name().clone(), values)
            };

            profile.declared_type = encoded.dtype().to_string();
            profile.kind = ColumnKind::Numeric;
            frame.df.with_column(encoded)?;
            changed += 1;
        }

        Ok(changed)
    }

    fn name(&self) -> &'static str {
        "categorical_encoding"
    }

    fn description(&self) -> String {
        "Label-encode low-cardinality text columns (columns changed)".to_owned()
    }
}

/// Fills missing cells with the nearest preceding value in the same column.
/// Leading missing cells have nothing to copy and stay missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardFill;

fn missing_cells(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

impl Transform for ForwardFill {
    fn apply(&self, frame: &mut ProfiledFrame) -> Result<usize> {
        let before = missing_cells(&frame.df);
        if before == 0 {
            return Ok(0);
        }
        frame.df = frame.df.fill_null(FillNullStrategy::Forward(None))?;
        Ok(before - missing_cells(&frame.df))
    }

    fn name(&self) -> &'static str {
        "forward_fill"
    }

    fn description(&self) -> String {
        "Forward-fill missing values (cells filled)".to_owned()
    }
}

/// Drops rows identical to an earlier row, keeping the original order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropDuplicates;

impl Transform for DropDuplicates {
    fn apply(&self, frame: &mut ProfiledFrame) -> Result<usize> {
        let before = frame.df.height();
        frame.df = frame
            .df
            .unique_stable(None, UniqueKeepStrategy::First, None)?;
        Ok(before - frame.df.height())
    }

    fn name(&self) -> &'static str {
        "drop_duplicates"
    }

    fn description(&self) -> String {
        "Remove repeated rows, keeping the first (rows removed)".to_owned()
    }
}
