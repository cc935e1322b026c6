//! Database error categorization and message formatting
//!
//! Categorizes `sea_orm::DbErr` values so services can turn constraint
//! violations into conflicts and the HTTP layer can pick a status code.
//!
//! # Examples
//!
//! ```rust
//! use datagate::common::db_errors::*;
//! use sea_orm::DbErr;
//!
//! let err = DbErr::RecordNotFound("Dataset not found".to_string());
//! let (kind, message) = format_db_error("find dataset", &err);
//!
//! assert_eq!(kind, DbErrorKind::NotFound);
//! assert_eq!(message, "find dataset: record not found");
//! ```

use sea_orm::DbErr;

/// Categories of database errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Record not found (query returned no results)
    NotFound,

    /// Unique constraint violation
    ///
    /// Typically indicates a 409 Conflict error - resource already exists.
    UniqueViolation,

    /// Foreign key constraint violation
    ///
    /// Typically indicates a 400 Bad Request - invalid reference.
    ForeignKeyViolation,

    /// Database connection error
    ConnectionError,

    /// Query timeout
    Timeout,

    /// Transaction deadlock or SQLite write lock contention
    ///
    /// Should be retried.
    Deadlock,

    /// Unknown/other database error
    Unknown,
}

impl DbErrorKind {
    /// Categorize a sea_orm database error
    ///
    /// ```
    /// use datagate::common::db_errors::DbErrorKind;
    /// use sea_orm::DbErr;
    ///
    /// let err = DbErr::Custom("UNIQUE constraint failed: dataset_rows.row_index".to_string());
    /// assert_eq!(DbErrorKind::from_db_err(&err), DbErrorKind::UniqueViolation);
    /// ```
    pub fn from_db_err(err: &DbErr) -> Self {
        if let DbErr::RecordNotFound(_) = err {
            return Self::NotFound;
        }

        let msg_lower = err.to_string().to_lowercase();
        if msg_lower.contains("unique") || msg_lower.contains("duplicate") {
            Self::UniqueViolation
        } else if msg_lower.contains("foreign key") || msg_lower.contains("fk_") {
            Self::ForeignKeyViolation
        } else if msg_lower.contains("deadlock") || msg_lower.contains("database is locked") {
            Self::Deadlock
        } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
            Self::Timeout
        } else if matches!(err, DbErr::Conn(_)) || msg_lower.contains("connection") {
            Self::ConnectionError
        } else {
            Self::Unknown
        }
    }

    /// Get appropriate HTTP status code for this error kind
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::UniqueViolation => 409,
            Self::ForeignKeyViolation => 400,
            Self::ConnectionError => 503,
            Self::Timeout => 504,
            Self::Deadlock => 503,
            Self::Unknown => 500,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionError | Self::Timeout | Self::Deadlock)
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::UniqueViolation | Self::ForeignKeyViolation
        )
    }
}

/// Format database error with operation context
///
/// Returns the categorized kind together with a message naming the
/// operation that failed.
pub fn format_db_error(operation: &str, err: &DbErr) -> (DbErrorKind, String) {
    let kind = DbErrorKind::from_db_err(err);

    let message = match kind {
        DbErrorKind::NotFound => format!("{}: record not found", operation),
        DbErrorKind::UniqueViolation => format!("{}: duplicate key violation", operation),
        DbErrorKind::ForeignKeyViolation => {
            format!("{}: foreign key constraint violation", operation)
        }
        DbErrorKind::ConnectionError => format!("{}: database connection failed", operation),
        DbErrorKind::Timeout => format!("{}: query timeout", operation),
        DbErrorKind::Deadlock => format!("{}: transaction deadlock", operation),
        DbErrorKind::Unknown => format!("{}: database error - {}", operation, err),
    };

    (kind, message)
}
