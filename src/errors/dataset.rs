//! Dataset import error types
//!
//! Errors raised while turning an uploaded file into row documents. These are
//! file-level failures: the upload as a whole cannot be read. Problems with
//! individual rows are reported by the validation pass instead.
//!
//! # Examples
//!
//! ```rust
//! use datagate::errors::DatasetError;
//!
//! let err = DatasetError::UnsupportedFormat("report.pdf".to_string());
//! assert!(err.is_client_error());
//! assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
//! ```

use thiserror::Error;

/// File import errors
#[derive(Error, Debug)]
pub enum DatasetError {
    /// File extension is not one of the supported formats
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid CSV or TSV content
    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),

    /// Invalid JSON content
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Invalid spreadsheet content
    #[error("Invalid spreadsheet: {0}")]
    InvalidSpreadsheet(String),

    /// Header row missing, blank or duplicated
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// File has no header row or no content at all
    #[error("Empty data set: {0}")]
    EmptySource(String),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DatasetError {
    /// Check if this is a client error (400-series)
    pub fn is_client_error(&self) -> bool {
        // Every import failure is caused by the uploaded content
        true
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            DatasetError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            DatasetError::InvalidCsv(_) | DatasetError::CsvError(_) => "INVALID_CSV",
            DatasetError::InvalidJson(_) | DatasetError::JsonError(_) => "INVALID_JSON",
            DatasetError::InvalidSpreadsheet(_) => "INVALID_SPREADSHEET",
            DatasetError::InvalidHeader(_) => "INVALID_HEADER",
            DatasetError::EmptySource(_) => "EMPTY_SOURCE",
        }
    }
}
