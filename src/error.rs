use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// A label that has no entry in its encoding table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unknown {field} label {label:?}")]
    UnknownLabel { field: &'static str, label: String },
}

/// Rejections raised while validating a submitted form.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("{field} is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },
    #[error("age {age} out of range [0, 100]")]
    AgeOutOfRange { age: i64 },
    #[error("{field} must be a non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },
}

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },
    #[error("the uploaded table has no rows")]
    EmptyTable,
    #[error("missing stroke label at row {row}")]
    MissingLabel { row: usize },
    #[error("{count} cells have unknown labels (first: {first})")]
    UnmappedLabels { count: usize, first: String },
    #[error("could not read table: {0}")]
    Polars(#[from] PolarsError),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("could not read model artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid model artifact: {0}")]
    Json(#[from] serde_json::Error),
    #[error("feature schema mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("tree {tree} is malformed: {reason}")]
    InvalidTree { tree: usize, reason: String },
    #[error("model expects {expected} features, got {found}")]
    WidthMismatch { expected: usize, found: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Failure of one batch upload. Reported to the user as a single message.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("prediction failed: {0}")]
    Model(#[from] ModelError),
    #[error("could not read table: {0}")]
    Polars(#[from] PolarsError),
}
