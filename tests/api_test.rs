//! API integration tests
//!
//! REST endpoints exercised through axum-test against a file-backed SQLite
//! database

use std::sync::Arc;

use anyhow::Result;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use datagate::config::AppConfig;
use datagate::database::{establish_connection, setup_database};
use datagate::server::app::create_app;
use datagate::storage::LocalFileStore;
use serde_json::{json, Value};
use tempfile::{NamedTempFile, TempDir};

struct TestApp {
    server: TestServer,
    _db_file: NamedTempFile,
    _uploads: TempDir,
}

async fn setup_test_server() -> Result<TestApp> {
    setup_with_config(AppConfig::default()).await
}

async fn setup_with_config(config: AppConfig) -> Result<TestApp> {
    let db_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", db_file.path().display());
    let db = establish_connection(&db_url).await?;
    setup_database(&db).await?;

    let uploads = tempfile::tempdir()?;
    let store = Arc::new(LocalFileStore::new(uploads.path()).await?);

    let app = create_app(db, config, store).await?;
    let server = TestServer::new(app)?;

    Ok(TestApp {
        server,
        _db_file: db_file,
        _uploads: uploads,
    })
}

fn as_user(request: TestRequest, user_id: i32, role: &str) -> TestRequest {
    request
        .add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_str(&user_id.to_string()).unwrap(),
        )
        .add_header(
            HeaderName::from_static("x-user-role"),
            HeaderValue::from_str(role).unwrap(),
        )
}

fn as_admin(request: TestRequest) -> TestRequest {
    as_user(request, 1, "admin")
}

fn as_member(request: TestRequest) -> TestRequest {
    as_user(request, 2, "member")
}

/// Project plus a two-row dataset; returns the dataset id
async fn create_dataset(server: &TestServer) -> i64 {
    let response = as_admin(server.post("/api/v1/projects"))
        .json(&json!({"name": "Inventory", "description": "Stock levels"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let project: Value = response.json();
    let project_id = project["id"].as_i64().unwrap();

    let response = as_admin(server.post(&format!("/api/v1/projects/{}/datasets", project_id)))
        .add_query_param("name", "items")
        .add_query_param("file_name", "items.csv")
        .text("sku,qty\nA-1,5\nB-2,7\n")
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let dataset: Value = response.json();
    assert_eq!(dataset["status"], "ready");
    assert_eq!(dataset["row_count"], 2);
    assert_eq!(dataset["column_count"], 2);
    dataset["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["service"], "datagate");
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_projects_api() -> Result<()> {
    let app = setup_test_server().await?;
    let server = &app.server;

    let response = as_member(server.post("/api/v1/projects"))
        .json(&json!({"name": "Survey"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let project: Value = response.json();
    let project_id = project["id"].as_i64().unwrap();
    assert_eq!(project["owner_id"], 2);

    let projects: Vec<Value> = server.get("/api/v1/projects").await.json();
    assert_eq!(projects.len(), 1);

    let response = server.get(&format!("/api/v1/projects/{}", project_id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = as_member(server.delete(&format!("/api/v1/projects/{}", project_id))).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = server.get(&format!("/api/v1/projects/{}", project_id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_mutations_require_identity() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app
        .server
        .post("/api/v1/projects")
        .json(&json!({"name": "Anonymous"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "UNAUTHORIZED");

    let response = as_user(app.server.post("/api/v1/projects"), 3, "superuser")
        .json(&json!({"name": "Unknown role"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_unsupported_upload_is_rejected() -> Result<()> {
    let app = setup_test_server().await?;
    let server = &app.server;

    let project: Value = as_admin(server.post("/api/v1/projects"))
        .json(&json!({"name": "Docs"}))
        .await
        .json();

    let response = as_admin(server.post(&format!("/api/v1/projects/{}/datasets", project["id"])))
        .add_query_param("name", "report")
        .add_query_param("file_name", "report.pdf")
        .text("%PDF-1.4")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "UNSUPPORTED_FORMAT");
    Ok(())
}

#[tokio::test]
async fn test_submission_round_trip() -> Result<()> {
    let app = setup_test_server().await?;
    let server = &app.server;
    let dataset_id = create_dataset(server).await;

    let response = as_admin(server.post(&format!("/api/v1/datasets/{}/schemas", dataset_id)))
        .json(&json!({
            "name": "items v1",
            "fields": [
                {"name": "sku", "data_type": "string", "is_required": true, "is_unique": true},
                {"name": "qty", "data_type": "number", "is_required": true}
            ]
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let schema: Value = response.json();
    assert_eq!(schema["is_active"], true);
    assert_eq!(schema["fields"].as_array().map(Vec::len), Some(2));

    // Validation runs right after intake with the default configuration
    let response = as_member(server.post(&format!(
        "/api/v1/datasets/{}/submissions/rows",
        dataset_id
    )))
    .json(&json!({"rows": [
        {"sku": "C-3", "qty": 4},
        {"sku": "A-1", "qty": 1},
        {"sku": "D-4", "qty": "many"}
    ]}))
    .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let created: Value = response.json();
    let submission_id = created["submission"]["id"].as_i64().unwrap();
    assert_eq!(created["submission"]["status"], "under_review");
    assert_eq!(created["validation"]["valid_rows"], 1);
    assert_eq!(created["validation"]["invalid_rows"], 2);

    let staged: Vec<Value> = server
        .get(&format!("/api/v1/submissions/{}/rows", submission_id))
        .await
        .json();
    assert_eq!(staged.len(), 3);
    assert_eq!(staged[1]["validation_errors"][0]["code"], "duplicate");

    let response = as_member(server.post(&format!(
        "/api/v1/submissions/{}/review",
        submission_id
    )))
    .json(&json!({"decision": "approve"}))
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = as_admin(server.post(&format!(
        "/api/v1/submissions/{}/review",
        submission_id
    )))
    .json(&json!({"decision": "approve", "notes": "looks fine"}))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let outcome: Value = response.json();
    assert_eq!(outcome["submission"]["status"], "applied");
    assert_eq!(outcome["applied"]["rows_applied"], 1);
    assert_eq!(outcome["applied"]["dataset_row_count"], 3);

    let page: Value = server
        .get(&format!("/api/v1/datasets/{}/rows", dataset_id))
        .add_query_param("field", "sku")
        .add_query_param("value", "C-3")
        .await
        .json();
    assert_eq!(page["total"], 1);
    assert_eq!(page["rows"][0]["row_index"], 2);
    assert_eq!(page["rows"][0]["source_submission_id"], submission_id);

    let response = as_admin(server.post(&format!(
        "/api/v1/submissions/{}/apply",
        submission_id
    )))
    .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"], "INVALID_TRANSITION");
    Ok(())
}

#[tokio::test]
async fn test_manual_validation_and_duplicate_upload() -> Result<()> {
    let mut config = AppConfig::default();
    config.workflow.auto_validate = false;
    let app = setup_with_config(config).await?;
    let server = &app.server;
    let dataset_id = create_dataset(server).await;

    let upload = |server: &TestServer| {
        as_member(server.post(&format!("/api/v1/datasets/{}/submissions", dataset_id)))
            .add_query_param("file_name", "more.csv")
            .text("sku,qty\nE-5,1\n")
    };

    let response = upload(server).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let created: Value = response.json();
    let submission_id = created["submission"]["id"].as_i64().unwrap();
    assert_eq!(created["submission"]["status"], "pending");
    assert!(created.get("validation").is_none());

    let response = upload(server).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let response = as_admin(server.post(&format!(
        "/api/v1/submissions/{}/apply",
        submission_id
    )))
    .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let response = as_member(server.post(&format!(
        "/api/v1/submissions/{}/validate",
        submission_id
    )))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let report: Value = response.json();
    assert_eq!(report["submission"]["status"], "under_review");
    assert_eq!(report["summary"]["valid_rows"], 1);
    assert_eq!(report["summary"]["schema_id"], Value::Null);

    let listed: Vec<Value> = server
        .get(&format!("/api/v1/datasets/{}/submissions", dataset_id))
        .add_query_param("status", "under_review")
        .await
        .json();
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_business_rules_api() -> Result<()> {
    let app = setup_test_server().await?;
    let server = &app.server;
    let dataset_id = create_dataset(server).await;
    let rules_path = format!("/api/v1/datasets/{}/rules", dataset_id);

    let rule = json!({
        "rule_name": "positive quantity",
        "rule_type": "range_check",
        "rule_config": {"field": "qty", "min": 1},
        "error_message": "qty must be at least 1"
    });

    let response = as_member(server.post(&rules_path)).json(&rule).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = as_admin(server.post(&rules_path)).json(&rule).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["severity"], "error");
    let rule_id = created["id"].as_i64().unwrap();

    let response = as_admin(server.post(&rules_path))
        .json(&json!({
            "rule_name": "broken",
            "rule_type": "cross_field",
            "rule_config": {"field": "qty"},
            "error_message": "never stored"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = as_admin(server.patch(&format!("/api/v1/rules/{}", rule_id)))
        .json(&json!({"is_active": false}))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let active: Vec<Value> = server
        .get(&rules_path)
        .add_query_param("active_only", "true")
        .await
        .json();
    assert!(active.is_empty());

    let response = as_admin(server.delete(&format!("/api/v1/rules/{}", rule_id))).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn test_schema_changes_are_limited_to_the_owner() -> Result<()> {
    let app = setup_test_server().await?;
    let server = &app.server;
    let dataset_id = create_dataset(server).await;
    let schemas_path = format!("/api/v1/datasets/{}/schemas", dataset_id);
    let schema = json!({
        "name": "items v1",
        "fields": [{"name": "sku", "data_type": "string", "is_required": true}]
    });

    let response = as_member(server.post(&schemas_path)).json(&schema).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"], "FORBIDDEN");

    let response = as_admin(server.post(&schemas_path)).json(&schema).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let created: Value = response.json();
    let schema_id = created["id"].as_i64().unwrap();

    let response = as_member(server.post(&format!("/api/v1/schemas/{}/fields", schema_id)))
        .json(&json!({"name": "qty", "data_type": "number", "is_required": true}))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = as_member(server.post(&format!("/api/v1/schemas/{}/activate", schema_id))).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let stored: Value = server.get(&format!("/api/v1/schemas/{}", schema_id)).await.json();
    assert_eq!(stored["fields"].as_array().map(Vec::len), Some(1));
    Ok(())
}
