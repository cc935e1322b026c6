use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::auth::Identity;
use crate::database::entities::{data_submissions, staging_rows};
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::services::{ApplyReport, ReviewOutcome, ValidationReport};
use crate::validation::ValidationSummary;
use crate::workflow::{ReviewDecision, SubmissionStatus};

#[derive(Deserialize)]
pub struct SubmissionFilter {
    pub status: Option<SubmissionStatus>,
}

#[derive(Deserialize)]
pub struct UploadSubmissionParams {
    pub file_name: String,
}

#[derive(Deserialize)]
pub struct SubmitRowsRequest {
    pub rows: Vec<Value>,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    pub notes: Option<String>,
}

/// Intake result, with the validation pass when it ran automatically
#[derive(Serialize)]
pub struct SubmissionCreated {
    pub submission: data_submissions::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

pub async fn list_submissions(
    State(state): State<AppState>,
    Path(dataset_id): Path<i32>,
    Query(filter): Query<SubmissionFilter>,
) -> Result<Json<Vec<data_submissions::Model>>, ApiError> {
    let submissions = state
        .submissions
        .list_submissions(dataset_id, filter.status)
        .await?;
    Ok(Json(submissions))
}

pub async fn upload_submission(
    State(state): State<AppState>,
    identity: Identity,
    Path(dataset_id): Path<i32>,
    Query(params): Query<UploadSubmissionParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<SubmissionCreated>), ApiError> {
    let submission = state
        .submissions
        .submit_file(&identity, dataset_id, &params.file_name, body.to_vec())
        .await?;
    Ok((StatusCode::CREATED, Json(after_intake(&state, submission).await)))
}

pub async fn submit_rows(
    State(state): State<AppState>,
    identity: Identity,
    Path(dataset_id): Path<i32>,
    Json(payload): Json<SubmitRowsRequest>,
) -> Result<(StatusCode, Json<SubmissionCreated>), ApiError> {
    let submission = state
        .submissions
        .submit_rows(&identity, dataset_id, &payload.rows)
        .await?;
    Ok((StatusCode::CREATED, Json(after_intake(&state, submission).await)))
}

/// Run the validation pass when `auto_validate` is on. The submission is
/// already staged, so a failure here is reported and leaves it `pending`.
async fn after_intake(
    state: &AppState,
    submission: data_submissions::Model,
) -> SubmissionCreated {
    if !state.config.workflow.auto_validate {
        return SubmissionCreated {
            submission,
            validation: None,
            validation_error: None,
        };
    }

    match state.reviews.validate_submission(submission.id).await {
        Ok(report) => SubmissionCreated {
            submission: report.submission,
            validation: Some(report.summary),
            validation_error: None,
        },
        Err(e) => {
            warn!("Automatic validation of submission {} failed: {}", submission.id, e);
            SubmissionCreated {
                submission,
                validation: None,
                validation_error: Some(e.to_string()),
            }
        }
    }
}

pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<data_submissions::Model>, ApiError> {
    Ok(Json(state.submissions.get_submission(id).await?))
}

pub async fn staged_rows(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<staging_rows::Model>>, ApiError> {
    Ok(Json(state.submissions.staged_rows(id).await?))
}

pub async fn validate_submission(
    State(state): State<AppState>,
    _identity: Identity,
    Path(id): Path<i32>,
) -> Result<Json<ValidationReport>, ApiError> {
    Ok(Json(state.reviews.validate_submission(id).await?))
}

pub async fn review_submission(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<ReviewOutcome>, ApiError> {
    let outcome = state
        .reviews
        .review_submission(&identity, id, payload.decision, payload.notes.as_deref())
        .await?;
    Ok(Json(outcome))
}

pub async fn apply_submission(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
) -> Result<Json<ApplyReport>, ApiError> {
    Ok(Json(state.reviews.apply_submission(&identity, id).await?))
}
