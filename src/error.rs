//! Error types for loading, validating and segmenting customer tables.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Invalid value in column '{column}' at row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("File not found at '{}'", .0.display())]
    SourceNotFound(PathBuf),

    #[error("The source '{0}' contains no data")]
    EmptySource(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Table error: {0}")]
    Polars(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmentError {
    pub(crate) fn invalid_value(column: &str, row: usize, reason: impl Into<String>) -> Self {
        SegmentError::InvalidValue {
            column: column.to_string(),
            row,
            reason: reason.into(),
        }
    }

    /// True for failures caused by the shape or content of the table.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            SegmentError::MissingColumns(_) | SegmentError::InvalidValue { .. }
        )
    }
}
