//! Schema profiler.
//!
//! Dtypes come from the CSV reader; the profiler only names them and derives
//! a [`ColumnKind`] per column so the transform steps know what they are
//! allowed to touch.

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Literal tokens a text column may contain to be treated as boolean.
pub const TRUE_TOKEN: &str = "True";
pub const FALSE_TOKEN: &str = "False";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
    BooleanLike,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    /// Dtype name as reported by the reader (`i64`, `str`, `bool`, ...)
    pub declared_type: String,
    pub kind: ColumnKind,
}

/// Summary returned to the client after upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSummary {
    pub columns: Vec<String>,
    pub column_count: usize,
    pub row_count: usize,
    pub dtypes: BTreeMap<String, String>,
    pub kinds: BTreeMap<String, ColumnKind>,
}

/// Profile every column of `df` in order.
///
/// # Errors
///
/// Returns `MalformedInput` if a string column cannot be read back as text.
pub fn profile(df: &DataFrame, categorical_threshold: usize) -> Result<Vec<ColumnProfile>> {
    df.get_columns()
        .iter()
        .map(|column| {
            let series = column.as_materialized_series();
            Ok(ColumnProfile {
                name: series.name().to_string(),
                declared_type: series.dtype().to_string(),
                kind: infer_kind(series, categorical_threshold)?,
            })
        })
        .collect()
}

/// Build the client-facing summary from profiles.
pub fn summarize(profiles: &[ColumnProfile], row_count: usize) -> SchemaSummary {
    SchemaSummary {
        columns: profiles.iter().map(|p| p.name.clone()).collect(),
        column_count: profiles.len(),
        row_count,
        dtypes: profiles
            .iter()
            .map(|p| (p.name.clone(), p.declared_type.clone()))
            .collect(),
        kinds: profiles.iter().map(|p| (p.name.clone(), p.kind)).collect(),
    }
}

fn infer_kind(series: &Series, categorical_threshold: usize) -> Result<ColumnKind> {
    let dtype = series.dtype();
    if dtype.is_primitive_numeric() {
        return Ok(ColumnKind::Numeric);
    }
    // Boolean dtype carries no source spelling to check against the tokens.
    if !matches!(dtype, DataType::String) {
        return Ok(ColumnKind::Text);
    }

    let distinct = distinct_text_values(series)?;
    if is_boolean_tokens(&distinct) {
        Ok(ColumnKind::BooleanLike)
    } else if is_boolean_spelling(&distinct) {
        Ok(ColumnKind::Text)
    } else if distinct.len() < categorical_threshold {
        Ok(ColumnKind::Categorical)
    } else {
        Ok(ColumnKind::Text)
    }
}

/// Non-missing distinct values of a string column, sorted.
pub(crate) fn distinct_text_values(series: &Series) -> Result<BTreeSet<&str>> {
    Ok(series.str()?.into_iter().flatten().collect())
}

fn is_boolean_tokens(distinct: &BTreeSet<&str>) -> bool {
    !distinct.is_empty()
        && distinct
            .iter()
            .all(|value| *value == TRUE_TOKEN || *value == FALSE_TOKEN)
}

/// Other spellings of true/false (`true`, `FALSE`, ...). The reader types
/// these as boolean, so they are neither coerced nor label-encoded.
fn is_boolean_spelling(distinct: &BTreeSet<&str>) -> bool {
    !distinct.is_empty()
        && distinct.iter().all(|value| {
            value.eq_ignore_ascii_case(TRUE_TOKEN) || value.eq_ignore_ascii_case(FALSE_TOKEN)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::read_csv_bytes;

    fn kinds(csv: &str, threshold: usize) -> Result<Vec<ColumnKind>> {
        let df = read_csv_bytes(csv.as_bytes(), 100)?;
        Ok(profile(&df, threshold)?.into_iter().map(|p| p.kind).collect())
    }

    #[test]
    fn test_profile_reports_names_and_dtypes() -> Result<()> {
        let df = read_csv_bytes(b"age,city,score\n31,Oslo,1.5\n40,Rome,2.0\n", 100)?;
        let profiles = profile(&df, 50)?;
        let summary = summarize(&profiles, df.height());

        assert_eq!(summary.columns, vec!["age", "city", "score"]);
        assert_eq!(summary.column_count, 3);
        assert_eq!(summary.row_count, 2);
        assert_eq!(summary.dtypes["age"], "i64");
        assert_eq!(summary.dtypes["city"], "str");
        assert_eq!(summary.dtypes["score"], "f64");
        assert_eq!(summary.kinds["age"], ColumnKind::Numeric);
        assert_eq!(summary.kinds["city"], ColumnKind::Categorical);
        Ok(())
    }

    #[test]
    fn test_boolean_tokens_including_singletons() -> Result<()> {
        assert_eq!(
            kinds("id,flag\n1,True\n2,False\n3,\n4,True\n", 50)?,
            vec![ColumnKind::Numeric, ColumnKind::BooleanLike]
        );
        assert_eq!(
            kinds("id,flag\n1,True\n2,True\n", 50)?,
            vec![ColumnKind::Numeric, ColumnKind::BooleanLike]
        );
        Ok(())
    }

    #[test]
    fn test_other_boolean_spellings_are_left_as_text() -> Result<()> {
        assert_eq!(
            kinds("flag\ntrue\nfalse\n", 50)?,
            vec![ColumnKind::Text]
        );
        assert_eq!(
            kinds("flag\nTRUE\nFalse\n", 50)?,
            vec![ColumnKind::Text]
        );
        Ok(())
    }

    #[test]
    fn test_boolean_dtype_is_not_coerced() -> Result<()> {
        let df = DataFrame::new(vec![Column::new("flag".into(), [true, false])])?;
        let profiles = profile(&df, 50)?;
        assert_eq!(profiles[0].kind, ColumnKind::Text);
        Ok(())
    }

    #[test]
    fn test_mixed_tokens_are_not_boolean() -> Result<()> {
        assert_eq!(
            kinds("answer\nTrue\nYes\nTrue\n", 50)?,
            vec![ColumnKind::Categorical]
        );
        Ok(())
    }

    #[test]
    fn test_threshold_separates_categorical_from_text() -> Result<()> {
        let csv = "code\na\nb\nc\nd\n";
        assert_eq!(kinds(csv, 5)?, vec![ColumnKind::Categorical]);
        assert_eq!(kinds(csv, 4)?, vec![ColumnKind::Text]);
        Ok(())
    }
}
