use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::auth::Identity;
use crate::database::entities::{dataset_schemas, schema_fields};
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::services::{NewSchemaField, SchemaWithFields};

#[derive(Deserialize)]
pub struct CreateSchemaRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<NewSchemaField>,
}

#[derive(Deserialize)]
pub struct SwapFieldsRequest {
    pub first_field_id: i32,
    pub second_field_id: i32,
}

pub async fn list_schemas(
    State(state): State<AppState>,
    Path(dataset_id): Path<i32>,
) -> Result<Json<Vec<dataset_schemas::Model>>, ApiError> {
    Ok(Json(state.schemas.list_schemas(dataset_id).await?))
}

pub async fn create_schema(
    State(state): State<AppState>,
    identity: Identity,
    Path(dataset_id): Path<i32>,
    Json(payload): Json<CreateSchemaRequest>,
) -> Result<(StatusCode, Json<SchemaWithFields>), ApiError> {
    let schema = state
        .schemas
        .create_schema(
            &identity,
            dataset_id,
            &payload.name,
            payload.description.as_deref(),
            payload.fields,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(schema)))
}

pub async fn get_schema(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SchemaWithFields>, ApiError> {
    Ok(Json(state.schemas.get_schema(id).await?))
}

pub async fn activate_schema(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
) -> Result<Json<dataset_schemas::Model>, ApiError> {
    Ok(Json(state.schemas.activate_schema(&identity, id).await?))
}

pub async fn add_field(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
    Json(field): Json<NewSchemaField>,
) -> Result<(StatusCode, Json<schema_fields::Model>), ApiError> {
    let field = state.schemas.add_field(&identity, id, field).await?;
    Ok((StatusCode::CREATED, Json(field)))
}

pub async fn swap_fields(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
    Json(payload): Json<SwapFieldsRequest>,
) -> Result<Json<Vec<schema_fields::Model>>, ApiError> {
    let fields = state
        .schemas
        .swap_field_positions(&identity, id, payload.first_field_id, payload.second_field_id)
        .await?;
    Ok(Json(fields))
}
