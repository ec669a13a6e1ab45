//! Centralized error handling for prepline.
//!
//! Every component reports failures through [`PreplineError`]. The boundary
//! converts it into an [`ErrorResponse`] so callers always receive a
//! structured `{kind, message}` pair instead of a bare string.
//!
//! ```
//! use prepline::error::{ErrorKind, PreplineError};
//!
//! let err = PreplineError::NotFound("raw artifact 'abc_data.csv'".to_owned());
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! assert_eq!(err.to_string(), "Not found: raw artifact 'abc_data.csv'");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for prepline operations.
#[derive(Debug)]
pub enum PreplineError {
    /// Wrong payload shape, unsupported extension, unsafe key component
    InvalidInput(String),

    /// Payload could not be parsed as a delimited table
    MalformedInput(String),

    /// Identifier or stage missing from the staging store
    NotFound(String),

    /// A submitted field failed type coercion or a range check
    InvalidFieldValue {
        /// Layer index when the field belongs to an indexed group
        index: Option<usize>,
        field: String,
        value: String,
        reason: String,
    },

    /// Underlying persistence failure
    Storage(String),

    /// Worker failure unrelated to input (panicked or cancelled task)
    Internal(String),
}

/// Discriminant of [`PreplineError`], exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    MalformedInput,
    NotFound,
    InvalidFieldValue,
    StorageError,
    Internal,
}

impl PreplineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidFieldValue { .. } => ErrorKind::InvalidFieldValue,
            Self::Storage(_) => ErrorKind::StorageError,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a field error outside any indexed group.
    pub fn invalid_field(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidFieldValue {
            index: None,
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a field error inside `layers[index]`.
    pub fn invalid_layer_field(
        index: usize,
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidFieldValue {
            index: Some(index),
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PreplineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Self::MalformedInput(msg) => write!(f, "Malformed table: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::InvalidFieldValue {
                index: Some(index),
                field,
                value,
                reason,
            } => write!(
                f,
                "Invalid value {value:?} for layers[{index}][{field}]: {reason}"
            ),
            Self::InvalidFieldValue {
                index: None,
                field,
                value,
                reason,
            } => write!(f, "Invalid value {value:?} for {field}: {reason}"),
            Self::Storage(msg) => write!(f, "Storage error: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for PreplineError {}

impl From<std::io::Error> for PreplineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PreplineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for PreplineError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

/// Result type alias for prepline operations.
pub type Result<T> = std::result::Result<T, PreplineError>;

/// Structured failure result handed back across the boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PreplineError> for ErrorResponse {
    fn from(err: &PreplineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<PreplineError> for ErrorResponse {
    fn from(err: PreplineError) -> Self {
        Self::from(&err)
    }
}
