use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::auth::Identity;
use crate::database::entities::projects;
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<projects::Model>>, ApiError> {
    Ok(Json(state.projects.list_projects().await?))
}

pub async fn create_project(
    State(state): State<AppState>,
    identity: Identity,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<projects::Model>), ApiError> {
    let project = state
        .projects
        .create_project(&identity, &payload.name, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<projects::Model>, ApiError> {
    Ok(Json(state.projects.get_project(id).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.projects.delete_project(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
