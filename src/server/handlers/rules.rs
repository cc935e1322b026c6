use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::auth::Identity;
use crate::database::entities::business_rules;
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::services::{BusinessRuleUpdate, NewBusinessRule};

#[derive(Deserialize)]
pub struct RuleFilter {
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_rules(
    State(state): State<AppState>,
    Path(dataset_id): Path<i32>,
    Query(filter): Query<RuleFilter>,
) -> Result<Json<Vec<business_rules::Model>>, ApiError> {
    Ok(Json(
        state.rules.list_rules(dataset_id, filter.active_only).await?,
    ))
}

pub async fn create_rule(
    State(state): State<AppState>,
    identity: Identity,
    Path(dataset_id): Path<i32>,
    Json(rule): Json<NewBusinessRule>,
) -> Result<(StatusCode, Json<business_rules::Model>), ApiError> {
    let rule = state.rules.create_rule(&identity, dataset_id, rule).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn update_rule(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
    Json(update): Json<BusinessRuleUpdate>,
) -> Result<Json<business_rules::Model>, ApiError> {
    Ok(Json(state.rules.update_rule(&identity, id, update).await?))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.rules.delete_rule(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
