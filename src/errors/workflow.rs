//! Workflow error types
//!
//! Structured errors for every stateful operation: projects, datasets,
//! schemas, business rules and the submission review workflow.
//!
//! Per-row validation failures are not errors. They are recorded on the
//! staged rows and never abort a validation pass; only storage-layer failures
//! surface through this type.
//!
//! # Examples
//!
//! ```rust
//! use datagate::errors::WorkflowError;
//! use datagate::workflow::SubmissionStatus;
//!
//! let err = WorkflowError::not_found("Dataset", 7);
//! assert!(err.is_not_found());
//!
//! let err = WorkflowError::InvalidTransition {
//!     from: SubmissionStatus::Pending,
//!     to: SubmissionStatus::Applied,
//! };
//! assert_eq!(err.error_code(), "INVALID_TRANSITION");
//! ```

use sea_orm::DbErr;
use thiserror::Error;

use super::DatasetError;
use crate::common::db_errors::{format_db_error, DbErrorKind};
use crate::workflow::SubmissionStatus;

/// Workflow operation errors
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Referenced entity does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    /// Duplicate or overlapping state (in-flight submission, unique constraint)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Submission state machine edge that does not exist
    #[error("Invalid submission transition from {from} to {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    /// Request input rejected before any state change
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Caller lacks the role required for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A multi-statement operation could not commit; nothing was written
    #[error("Transaction failed during {operation}: {source}")]
    TransactionFailed {
        operation: &'static str,
        #[source]
        source: DbErr,
    },

    /// Uploaded file could not be parsed
    #[error(transparent)]
    Import(#[from] DatasetError),

    /// File store failure
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        WorkflowError::NotFound { entity, id }
    }

    /// Map a database error raised by `operation`, turning constraint
    /// violations into conflicts.
    pub fn from_db(operation: &str, err: DbErr) -> Self {
        let (kind, message) = format_db_error(operation, &err);
        match kind {
            DbErrorKind::UniqueViolation => WorkflowError::Conflict(message),
            DbErrorKind::ForeignKeyViolation => WorkflowError::ValidationFailed(message),
            _ => WorkflowError::Database(err),
        }
    }

    pub fn transaction_failed(operation: &'static str, source: DbErr) -> Self {
        WorkflowError::TransactionFailed { operation, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkflowError::NotFound { .. })
    }

    /// Check if the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::TransactionFailed { .. } => true,
            WorkflowError::Database(err) => DbErrorKind::from_db_err(err).is_retryable(),
            _ => false,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "NOT_FOUND",
            WorkflowError::Conflict(_) => "CONFLICT",
            WorkflowError::InvalidTransition { .. } => "INVALID_TRANSITION",
            WorkflowError::ValidationFailed(_) => "VALIDATION_FAILED",
            WorkflowError::Forbidden(_) => "FORBIDDEN",
            WorkflowError::TransactionFailed { .. } => "TRANSACTION_FAILED",
            WorkflowError::Import(err) => err.error_code(),
            WorkflowError::Storage(_) => "STORAGE_ERROR",
            WorkflowError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Get the HTTP status code this error should be reported with
    pub fn http_status_code(&self) -> u16 {
        match self {
            WorkflowError::NotFound { .. } => 404,
            WorkflowError::Conflict(_) | WorkflowError::InvalidTransition { .. } => 409,
            WorkflowError::ValidationFailed(_) => 422,
            WorkflowError::Import(_) => 400,
            WorkflowError::Forbidden(_) => 403,
            WorkflowError::TransactionFailed { .. } => 503,
            WorkflowError::Storage(_) => 500,
            WorkflowError::Database(err) => DbErrorKind::from_db_err(err).http_status_code(),
        }
    }
}
