use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::errors::{DatasetError, WorkflowError};

/// Error returned by every handler, rendered as `{"error", "message"}`
#[derive(Debug)]
pub enum ApiError {
    Workflow(WorkflowError),
    /// Missing or malformed identity headers
    Unauthorized(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Workflow(err) => StatusCode::from_u16(err.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Workflow(err) => err.error_code(),
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<DatasetError> for ApiError {
    fn from(err: DatasetError) -> Self {
        ApiError::Workflow(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Workflow(err) => err.to_string(),
            ApiError::Unauthorized(message) => message.clone(),
        };

        if status.is_server_error() {
            error!("Request failed ({}): {}", status, message);
        }

        let body = json!({
            "error": self.code(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_errors_keep_their_status() {
        let err = ApiError::from(WorkflowError::not_found("Dataset", 3));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_FOUND");

        let err = ApiError::from(WorkflowError::Forbidden("members cannot".to_string()));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_missing_identity_is_unauthorized() {
        let err = ApiError::Unauthorized("x-user-id header is required".to_string());
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
