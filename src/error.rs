use std::path::PathBuf;

use thiserror::Error;

use crate::place::AddressError;

/// Errors raised by the persistence, import and lookup layers.
///
/// Aggregation itself never fails: unresolved coordinates are reported as
/// [`crate::aggregator::ResolutionWarning`] values and a failed save is reported
/// through [`crate::aggregator::RecomputeOutcome::saved`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read workbook: {0}")]
    WorkbookRead(#[from] calamine::Error),

    #[error("failed to write workbook: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("failed to encode snapshot: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "nominatim")]
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{sheet} row {line}: {message}")]
    InvalidRow {
        sheet: String,
        line: usize,
        message: String,
    },

    #[error("sheet {sheet} is missing column {column}")]
    MissingColumn { sheet: String, column: String },

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    View(String),

    #[error(transparent)]
    Address(#[from] AddressError),
}

pub type Result<T> = std::result::Result<T, Error>;
