use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::auth::Identity;
use crate::database::entities::datasets;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::services::{RowPage, RowQuery};

#[derive(Deserialize)]
pub struct UploadDatasetParams {
    pub name: String,
    /// Original file name; its extension selects the parser
    pub file_name: String,
    pub description: Option<String>,
}

pub async fn list_datasets(
    State(state): State<AppState>,
    Path(project_id): Path<i32>,
) -> Result<Json<Vec<datasets::Model>>, ApiError> {
    Ok(Json(state.datasets.list_datasets(project_id).await?))
}

pub async fn upload_dataset(
    State(state): State<AppState>,
    identity: Identity,
    Path(project_id): Path<i32>,
    Query(params): Query<UploadDatasetParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<datasets::Model>), ApiError> {
    let dataset = state
        .datasets
        .upload_dataset(
            &identity,
            project_id,
            &params.name,
            params.description.as_deref(),
            &params.file_name,
            body.to_vec(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(dataset)))
}

pub async fn get_dataset(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<datasets::Model>, ApiError> {
    Ok(Json(state.datasets.get_dataset(id).await?))
}

pub async fn delete_dataset(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.datasets.delete_dataset(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn query_rows(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<RowQuery>,
) -> Result<Json<RowPage>, ApiError> {
    Ok(Json(state.datasets.query_rows(id, &query).await?))
}
