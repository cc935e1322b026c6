//! Submission workflow tests
//!
//! Intake, validation, review and apply against a migrated SQLite database

use std::sync::Arc;

use anyhow::Result;
use datagate::auth::Identity;
use datagate::config::WorkflowConfig;
use datagate::database::entities::common_types::{DataType, RuleType, Severity};
use datagate::database::entities::{data_submissions, datasets};
use datagate::database::{establish_connection, setup_database};
use datagate::services::{
    BusinessRuleService, DatasetService, NewBusinessRule, NewSchemaField, ProjectService,
    ReviewService, RowQuery, SchemaService, SubmissionService,
};
use datagate::storage::LocalFileStore;
use datagate::workflow::{ReviewDecision, SubmissionStatus};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait};
use serde_json::{json, Value};
use tempfile::{NamedTempFile, TempDir};

struct Fixture {
    db: DatabaseConnection,
    submissions: SubmissionService,
    schemas: SchemaService,
    rules: BusinessRuleService,
    reviews: ReviewService,
    datasets: DatasetService,
    dataset_id: i32,
    _db_file: NamedTempFile,
    uploads: TempDir,
}

const ADMIN: Identity = Identity {
    user_id: 1,
    role: datagate::auth::Role::Admin,
};

/// A dataset with ten rows (`id`, `name`, `age`) and auto-apply switched off
async fn setup() -> Result<Fixture> {
    let db_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", db_file.path().display());
    let db = establish_connection(&db_url).await?;
    setup_database(&db).await?;

    let uploads = tempfile::tempdir()?;
    let store = Arc::new(LocalFileStore::new(uploads.path()).await?);

    let projects = ProjectService::new(db.clone());
    let datasets = DatasetService::new(db.clone(), store.clone());
    let project = projects.create_project(&ADMIN, "Census", None).await?;

    let mut csv = String::from("id,name,age\n");
    for i in 1..=10 {
        csv.push_str(&format!("{},Person {},{}\n", i, i, 20 + i));
    }
    let dataset = datasets
        .upload_dataset(&ADMIN, project.id, "people", None, "people.csv", csv.into_bytes())
        .await?;
    assert_eq!(dataset.row_count, 10);

    let workflow = WorkflowConfig {
        auto_apply_on_approve: false,
        ..WorkflowConfig::default()
    };

    Ok(Fixture {
        submissions: SubmissionService::new(db.clone(), store, workflow.max_rows_per_submission),
        schemas: SchemaService::new(db.clone()),
        rules: BusinessRuleService::new(db.clone()),
        reviews: ReviewService::new(db.clone(), workflow),
        datasets,
        dataset_id: dataset.id,
        db,
        _db_file: db_file,
        uploads,
    })
}

fn field(name: &str, data_type: DataType, is_required: bool, is_unique: bool) -> NewSchemaField {
    NewSchemaField {
        name: name.to_string(),
        data_type,
        is_required,
        is_unique,
        position: None,
        description: None,
    }
}

async fn add_people_schema(fx: &Fixture) -> Result<()> {
    fx.schemas
        .create_schema(
            &ADMIN,
            fx.dataset_id,
            "people v1",
            None,
            vec![
                field("id", DataType::Number, true, true),
                field("name", DataType::String, true, false),
                field("age", DataType::Number, false, false),
            ],
        )
        .await?;
    Ok(())
}

async fn row_count(db: &DatabaseConnection, dataset_id: i32) -> Result<i32> {
    Ok(datasets::Entity::find_by_id(dataset_id)
        .one(db)
        .await?
        .map(|d| d.row_count)
        .unwrap_or_default())
}

async fn status_of(db: &DatabaseConnection, submission_id: i32) -> Result<String> {
    Ok(data_submissions::Entity::find_by_id(submission_id)
        .one(db)
        .await?
        .map(|s| s.status)
        .unwrap_or_default())
}

/// Submit, validate and approve three rows, one of which has a bad age
async fn approved_submission(fx: &Fixture) -> Result<i32> {
    let rows = vec![
        json!({"id": 11, "name": "Kim", "age": 30}),
        json!({"id": 12, "name": "Lou", "age": "unknown"}),
        json!({"id": 13, "name": "Max", "age": 41}),
    ];
    let submission = fx
        .submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &rows)
        .await?;
    fx.reviews.validate_submission(submission.id).await?;
    fx.reviews
        .review_submission(&ADMIN, submission.id, ReviewDecision::Approve, Some("ok"))
        .await?;
    Ok(submission.id)
}

#[tokio::test]
async fn test_apply_appends_only_eligible_rows() -> Result<()> {
    let fx = setup().await?;
    add_people_schema(&fx).await?;

    let rows = vec![
        json!({"id": 11, "name": "Kim", "age": 30}),
        json!({"id": 12, "name": "Lou", "age": "unknown"}),
        json!({"id": 13, "name": "Max", "age": 41}),
    ];
    let submission = fx
        .submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &rows)
        .await?;

    let report = fx.reviews.validate_submission(submission.id).await?;
    assert_eq!(report.submission.status, "under_review");
    assert_eq!(report.summary.total_rows, 3);
    assert_eq!(report.summary.valid_rows, 2);
    assert_eq!(report.summary.invalid_rows, 1);
    assert!(report.submission.validation_results.is_some());

    let staged = fx.submissions.staged_rows(submission.id).await?;
    assert_eq!(staged[1].validation_status.as_deref(), Some("invalid"));
    let errors = staged[1].validation_errors.clone().unwrap_or(Value::Null);
    assert_eq!(errors[0]["field"], "age");
    assert_eq!(errors[0]["code"], "invalid_type");

    let outcome = fx
        .reviews
        .review_submission(&ADMIN, submission.id, ReviewDecision::Approve, None)
        .await?;
    assert_eq!(outcome.submission.status, "approved");
    assert_eq!(outcome.submission.reviewed_by, Some(ADMIN.user_id));
    assert!(outcome.applied.is_none());

    let applied = fx.reviews.apply_submission(&ADMIN, submission.id).await?;
    assert_eq!(applied.rows_applied, 2);
    assert_eq!(applied.first_row_index, Some(10));
    assert_eq!(applied.dataset_row_count, 12);
    assert_eq!(applied.submission.status, "applied");
    assert!(applied.submission.applied_at.is_some());

    assert_eq!(row_count(&fx.db, fx.dataset_id).await?, 12);

    let page = fx
        .datasets
        .query_rows(fx.dataset_id, &RowQuery::default())
        .await?;
    assert_eq!(page.total, 12);
    let indices: Vec<i32> = page.rows.iter().map(|r| r.row_index).collect();
    assert_eq!(indices, (0..12).collect::<Vec<i32>>());
    assert_eq!(page.rows[11].source_submission_id, Some(submission.id));
    assert_eq!(page.rows[11].data["name"], "Max");

    Ok(())
}

#[tokio::test]
async fn test_pending_submission_cannot_be_applied() -> Result<()> {
    let fx = setup().await?;
    let submission = fx
        .submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &[json!({"id": 99})])
        .await?;

    let err = fx
        .reviews
        .apply_submission(&ADMIN, submission.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");

    let err = fx
        .reviews
        .review_submission(&ADMIN, submission.id, ReviewDecision::Approve, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");

    assert_eq!(status_of(&fx.db, submission.id).await?, "pending");
    assert_eq!(row_count(&fx.db, fx.dataset_id).await?, 10);
    Ok(())
}

#[tokio::test]
async fn test_failed_apply_rolls_back_and_can_be_retried() -> Result<()> {
    let fx = setup().await?;
    add_people_schema(&fx).await?;
    let submission_id = approved_submission(&fx).await?;

    fx.db
        .execute_unprepared(
            "CREATE TRIGGER reject_rows BEFORE INSERT ON dataset_rows \
             BEGIN SELECT RAISE(ABORT, 'row store unavailable'); END;",
        )
        .await?;

    let err = fx.reviews.apply(submission_id).await.unwrap_err();
    assert_eq!(err.error_code(), "TRANSACTION_FAILED");
    assert!(err.is_retryable());
    assert_eq!(status_of(&fx.db, submission_id).await?, "approved");
    assert_eq!(row_count(&fx.db, fx.dataset_id).await?, 10);

    fx.db
        .execute_unprepared("DROP TRIGGER reject_rows;")
        .await?;

    let report = fx.reviews.apply(submission_id).await?;
    assert_eq!(report.rows_applied, 2);
    assert_eq!(report.dataset_row_count, 12);
    assert_eq!(status_of(&fx.db, submission_id).await?, "applied");
    Ok(())
}

#[tokio::test]
async fn test_second_apply_is_rejected() -> Result<()> {
    let fx = setup().await?;
    let submission_id = approved_submission(&fx).await?;

    let first = fx.reviews.apply(submission_id).await?;
    assert_eq!(first.rows_applied, 3);

    let err = fx.reviews.apply(submission_id).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");
    assert_eq!(row_count(&fx.db, fx.dataset_id).await?, 13);
    Ok(())
}

#[tokio::test]
async fn test_members_cannot_review_or_apply() -> Result<()> {
    let fx = setup().await?;
    let submission = fx
        .submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &[json!({"id": 50})])
        .await?;
    fx.reviews.validate_submission(submission.id).await?;

    let member = Identity::member(7);
    let err = fx
        .reviews
        .review_submission(&member, submission.id, ReviewDecision::Approve, None)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "FORBIDDEN");

    let err = fx
        .reviews
        .apply_submission(&member, submission.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "FORBIDDEN");
    assert_eq!(status_of(&fx.db, submission.id).await?, "under_review");
    Ok(())
}

#[tokio::test]
async fn test_rejection_is_terminal_and_keeps_staging_rows() -> Result<()> {
    let fx = setup().await?;
    let submission = fx
        .submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &[json!({"id": 60})])
        .await?;
    fx.reviews.validate_submission(submission.id).await?;

    let outcome = fx
        .reviews
        .review_submission(
            &ADMIN,
            submission.id,
            ReviewDecision::Reject,
            Some("  duplicate of last week  "),
        )
        .await?;
    assert_eq!(outcome.submission.status, "rejected");
    assert_eq!(
        outcome.submission.review_notes.as_deref(),
        Some("duplicate of last week")
    );

    let err = fx.reviews.apply(submission.id).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");
    assert_eq!(fx.submissions.staged_rows(submission.id).await?.len(), 1);

    // Identical rows may be submitted again once the first attempt is closed
    fx.submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &[json!({"id": 60})])
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_duplicates_against_existing_rows_are_invalid() -> Result<()> {
    let fx = setup().await?;
    add_people_schema(&fx).await?;

    let rows = vec![
        json!({"id": 3, "name": "Clash"}),
        json!({"id": 20, "name": "New"}),
        json!({"id": 20, "name": "Repeat"}),
    ];
    let submission = fx
        .submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &rows)
        .await?;
    let report = fx.reviews.validate_submission(submission.id).await?;
    assert_eq!(report.summary.valid_rows, 1);
    assert_eq!(report.summary.invalid_rows, 2);

    let staged = fx.submissions.staged_rows(submission.id).await?;
    let statuses: Vec<Option<&str>> = staged
        .iter()
        .map(|r| r.validation_status.as_deref())
        .collect();
    assert_eq!(statuses, vec![Some("invalid"), Some("valid"), Some("invalid")]);
    Ok(())
}

#[tokio::test]
async fn test_higher_priority_rule_failure_suppresses_later_rules() -> Result<()> {
    let fx = setup().await?;

    let capitalized = fx
        .rules
        .create_rule(
            &ADMIN,
            fx.dataset_id,
            NewBusinessRule {
                rule_name: "capitalized name".to_string(),
                rule_type: RuleType::FieldValidation,
                rule_config: json!({"field": "name", "pattern": "^[A-Z]"}),
                error_message: "name must start with a capital".to_string(),
                severity: Severity::Error,
                priority: 10,
                is_active: true,
            },
        )
        .await?;
    fx.rules
        .create_rule(
            &ADMIN,
            fx.dataset_id,
            NewBusinessRule {
                rule_name: "short name".to_string(),
                rule_type: RuleType::FieldValidation,
                rule_config: json!({"field": "name", "max_length": 5}),
                error_message: "name is too long".to_string(),
                severity: Severity::Warning,
                priority: 20,
                is_active: true,
            },
        )
        .await?;

    let submission = fx
        .submissions
        .submit_rows(
            &Identity::member(7),
            fx.dataset_id,
            &[json!({"id": 70, "name": "lowercase and long"})],
        )
        .await?;
    let report = fx.reviews.validate_submission(submission.id).await?;
    assert_eq!(report.summary.rules_evaluated, 2);
    assert_eq!(report.summary.invalid_rows, 1);

    let staged = fx.submissions.staged_rows(submission.id).await?;
    let errors = staged[0]
        .validation_errors
        .clone()
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["rule_id"], capitalized.id);
    assert_eq!(errors[0]["message"], "name must start with a capital");
    Ok(())
}

#[tokio::test]
async fn test_validation_only_runs_on_pending_submissions() -> Result<()> {
    let fx = setup().await?;
    let submission = fx
        .submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &[json!({"id": 80})])
        .await?;
    fx.reviews.validate_submission(submission.id).await?;

    let err = fx
        .reviews
        .validate_submission(submission.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TRANSITION");

    let listed = fx
        .submissions
        .list_submissions(fx.dataset_id, Some(SubmissionStatus::UnderReview))
        .await?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

async fn set_dataset_status(fx: &Fixture, error: bool) -> Result<()> {
    let dataset = datasets::Entity::find_by_id(fx.dataset_id)
        .one(&fx.db)
        .await?
        .ok_or_else(|| anyhow::anyhow!("dataset {} missing", fx.dataset_id))?;
    let active: datasets::ActiveModel = dataset.into();
    let active = if error {
        active.set_error("parse failed".to_string())
    } else {
        active.set_ready(10, 3)
    };
    active.update(&fx.db).await?;
    Ok(())
}

#[tokio::test]
async fn test_concurrent_submissions_cannot_both_claim_a_unique_value() -> Result<()> {
    let fx = setup().await?;
    add_people_schema(&fx).await?;

    let mut ids = Vec::new();
    for name in ["Nia", "Oto"] {
        let submission = fx
            .submissions
            .submit_rows(
                &Identity::member(7),
                fx.dataset_id,
                &[json!({"id": 50, "name": name})],
            )
            .await?;
        ids.push(submission.id);
    }
    // Both validate before either is applied, so both see id 50 as free
    for id in &ids {
        let report = fx.reviews.validate_submission(*id).await?;
        assert_eq!(report.summary.valid_rows, 1);
        fx.reviews
            .review_submission(&ADMIN, *id, ReviewDecision::Approve, None)
            .await?;
    }

    let first = fx.reviews.apply(ids[0]).await?;
    assert_eq!(first.rows_applied, 1);
    assert_eq!(first.dataset_row_count, 11);

    let err = fx.reviews.apply(ids[1]).await.unwrap_err();
    assert_eq!(err.error_code(), "CONFLICT");
    assert_eq!(status_of(&fx.db, ids[1]).await?, "approved");
    assert_eq!(row_count(&fx.db, fx.dataset_id).await?, 11);

    let page = fx
        .datasets
        .query_rows(
            fx.dataset_id,
            &RowQuery {
                field: Some("id".to_string()),
                value: Some("50".to_string()),
                ..RowQuery::default()
            },
        )
        .await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].data["name"], "Nia");
    Ok(())
}

#[tokio::test]
async fn test_datasets_that_are_not_ready_take_no_rows() -> Result<()> {
    let fx = setup().await?;
    let submission_id = approved_submission(&fx).await?;

    set_dataset_status(&fx, true).await?;
    let err = fx
        .submissions
        .submit_rows(&Identity::member(7), fx.dataset_id, &[json!({"id": 60})])
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONFLICT");

    let err = fx.reviews.apply(submission_id).await.unwrap_err();
    assert_eq!(err.error_code(), "CONFLICT");
    assert_eq!(status_of(&fx.db, submission_id).await?, "approved");

    set_dataset_status(&fx, false).await?;
    let report = fx.reviews.apply(submission_id).await?;
    assert_eq!(report.dataset_row_count, 10 + report.rows_applied as i32);
    Ok(())
}

#[tokio::test]
async fn test_failed_dataset_insert_removes_the_stored_upload() -> Result<()> {
    let fx = setup().await?;
    let stored_files = || -> Result<usize> { Ok(std::fs::read_dir(fx.uploads.path())?.count()) };
    assert_eq!(stored_files()?, 1);

    fx.db
        .execute_unprepared(
            "CREATE TRIGGER reject_datasets BEFORE INSERT ON datasets \
             BEGIN SELECT RAISE(ABORT, 'catalog unavailable'); END;",
        )
        .await?;

    let project = ProjectService::new(fx.db.clone())
        .create_project(&ADMIN, "Archive", None)
        .await?;
    let result = fx
        .datasets
        .upload_dataset(
            &ADMIN,
            project.id,
            "more people",
            None,
            "more.csv",
            b"id,name\n1,Ana\n".to_vec(),
        )
        .await;
    assert!(result.is_err());
    assert_eq!(stored_files()?, 1);
    Ok(())
}
