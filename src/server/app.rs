use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{datasets, health, projects, rules, schemas, submissions};
use crate::config::AppConfig;
use crate::services::{
    BusinessRuleService, DatasetService, ProjectService, ReviewService, SchemaService,
    SubmissionService,
};
use crate::storage::FileStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub projects: ProjectService,
    pub datasets: DatasetService,
    pub schemas: SchemaService,
    pub rules: BusinessRuleService,
    pub submissions: SubmissionService,
    pub reviews: ReviewService,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig, store: Arc<dyn FileStore>) -> Self {
        Self {
            projects: ProjectService::new(db.clone()),
            datasets: DatasetService::new(db.clone(), store.clone()),
            schemas: SchemaService::new(db.clone()),
            rules: BusinessRuleService::new(db.clone()),
            submissions: SubmissionService::new(
                db.clone(),
                store,
                config.workflow.max_rows_per_submission,
            ),
            reviews: ReviewService::new(db, config.workflow.clone()),
            config: Arc::new(config),
        }
    }
}

pub async fn create_app(
    db: DatabaseConnection,
    config: AppConfig,
    store: Arc<dyn FileStore>,
) -> Result<Router> {
    let cors = match config.server.cors_origin.as_deref() {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };
    let body_limit = config.storage.max_upload_bytes;
    let state = AppState::new(db, config, store);

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state);

    Ok(app)
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:id",
            get(projects::get_project).delete(projects::delete_project),
        )
        // Datasets
        .route(
            "/projects/:id/datasets",
            get(datasets::list_datasets).post(datasets::upload_dataset),
        )
        .route(
            "/datasets/:id",
            get(datasets::get_dataset).delete(datasets::delete_dataset),
        )
        .route("/datasets/:id/rows", get(datasets::query_rows))
        // Schemas
        .route(
            "/datasets/:id/schemas",
            get(schemas::list_schemas).post(schemas::create_schema),
        )
        .route("/schemas/:id", get(schemas::get_schema))
        .route("/schemas/:id/activate", post(schemas::activate_schema))
        .route("/schemas/:id/fields", post(schemas::add_field))
        .route("/schemas/:id/fields/swap", post(schemas::swap_fields))
        // Business rules
        .route(
            "/datasets/:id/rules",
            get(rules::list_rules).post(rules::create_rule),
        )
        .route(
            "/rules/:id",
            patch(rules::update_rule).delete(rules::delete_rule),
        )
        // Submissions
        .route(
            "/datasets/:id/submissions",
            get(submissions::list_submissions).post(submissions::upload_submission),
        )
        .route(
            "/datasets/:id/submissions/rows",
            post(submissions::submit_rows),
        )
        .route("/submissions/:id", get(submissions::get_submission))
        .route("/submissions/:id/rows", get(submissions::staged_rows))
        .route(
            "/submissions/:id/validate",
            post(submissions::validate_submission),
        )
        .route("/submissions/:id/review", post(submissions::review_submission))
        .route("/submissions/:id/apply", post(submissions::apply_submission))
}
