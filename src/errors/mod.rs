//! Domain-specific error types for datagate
//!
//! # Error Categories
//!
//! - **WorkflowError**: projects, datasets, schemas, rules and the submission
//!   review workflow
//! - **DatasetError**: reading uploaded files into row documents
//!
//! ## Using in Functions
//!
//! ```rust
//! use datagate::errors::{WorkflowError, WorkflowResult};
//!
//! fn require_rows(count: usize) -> WorkflowResult<usize> {
//!     if count == 0 {
//!         return Err(WorkflowError::ValidationFailed(
//!             "Submission contains no rows".to_string(),
//!         ));
//!     }
//!     Ok(count)
//! }
//! ```

pub mod dataset;
pub mod workflow;

pub use dataset::DatasetError;
pub use workflow::WorkflowError;

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Result type alias for file import operations
pub type DatasetResult<T> = Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_result_alias() {
        let result: WorkflowResult<i32> = Err(WorkflowError::not_found("Dataset", 1));
        assert!(result.is_err());
    }

    #[test]
    fn test_dataset_result_alias() {
        let result: DatasetResult<()> = Err(DatasetError::EmptySource("rows.csv".to_string()));
        assert!(result.is_err());
    }
}
