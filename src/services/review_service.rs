//! Validation, review and apply stages of the submission workflow
//!
//! Each stage moves a submission one edge along the state machine in
//! [`crate::workflow`]. Status flips are conditional updates on the expected
//! current status, so two concurrent requests cannot both take the same edge.

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::Identity;
use crate::config::WorkflowConfig;
use crate::database::entities::common_types::ValidationStatus;
use crate::database::entities::{data_submissions, dataset_rows, staging_rows};
use crate::errors::{DatasetError, WorkflowError, WorkflowResult};
use crate::records::{row_from_json, row_to_json};
use crate::services::business_rule_service::load_active_rules;
use crate::services::dataset_service::{
    append_rows, increment_row_count, next_row_index, require_dataset, require_ready_dataset,
};
use crate::services::schema_service::load_active_schema;
use crate::validation::{RowValidator, RuleSet, SchemaChecker, ValidationSummary};
use crate::workflow::{ReviewDecision, SubmissionStatus};

#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub submission: data_submissions::Model,
    pub summary: ValidationSummary,
}

#[derive(Clone, Debug, Serialize)]
pub struct ApplyReport {
    pub submission: data_submissions::Model,
    pub rows_applied: usize,
    /// row_index given to the first applied row, if any were applied
    pub first_row_index: Option<i32>,
    pub dataset_row_count: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReviewOutcome {
    pub submission: data_submissions::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<ApplyReport>,
    /// Set when an approval's automatic apply failed; the submission stays
    /// approved and can be applied again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_error: Option<String>,
}

#[derive(Clone)]
pub struct ReviewService {
    db: DatabaseConnection,
    workflow: WorkflowConfig,
}

impl ReviewService {
    pub fn new(db: DatabaseConnection, workflow: WorkflowConfig) -> Self {
        Self { db, workflow }
    }

    /// Validate every staged row of a pending submission and move it to
    /// `under_review`.
    ///
    /// Row failures are recorded on the rows. Only storage failures abort, in
    /// which case nothing is written.
    pub async fn validate_submission(&self, id: i32) -> WorkflowResult<ValidationReport> {
        let submission = require_submission(&self.db, id).await?;
        submission
            .get_status()?
            .transition(SubmissionStatus::UnderReview)?;

        let schema = load_active_schema(&self.db, submission.dataset_id).await?;
        let rules = RuleSet::compile(&load_active_rules(&self.db, submission.dataset_id).await?);
        let checker = schema.map(|s| SchemaChecker::new(s.schema.id, &s.fields));
        let mut validator = RowValidator::new(checker, rules);

        if let Some(checker) = validator.schema_mut() {
            if checker.has_unique_fields() {
                let existing: Vec<Value> = dataset_rows::Entity::find()
                    .select_only()
                    .column(dataset_rows::Column::Data)
                    .filter(dataset_rows::Column::DatasetId.eq(submission.dataset_id))
                    .into_tuple()
                    .all(&self.db)
                    .await?;
                debug!(
                    "Seeding uniqueness checks with {} existing rows",
                    existing.len()
                );
                for data in &existing {
                    if let Ok(row) = row_from_json(data) {
                        checker.seed_existing(&row);
                    }
                }
            }
        }

        let staged = staging_rows::Entity::find()
            .filter(staging_rows::Column::SubmissionId.eq(id))
            .order_by_asc(staging_rows::Column::RowIndex)
            .all(&self.db)
            .await?;

        let mut summary = ValidationSummary::new(validator.schema_id(), validator.rules());
        let mut updates = Vec::with_capacity(staged.len());
        for row in staged {
            let document = row_from_json(&row.data).map_err(DatasetError::from)?;
            let outcome = validator.validate(&document);
            summary.tally(outcome.status);

            let errors = if outcome.issues.is_empty() {
                None
            } else {
                Some(serde_json::to_value(&outcome.issues).map_err(DatasetError::from)?)
            };

            let mut active: staging_rows::ActiveModel = row.into();
            active.data = Set(row_to_json(&outcome.normalized));
            active.validation_status = Set(Some(outcome.status.as_ref().to_string()));
            active.validation_errors = Set(errors);
            updates.push(active);
        }

        let results = serde_json::to_value(&summary).map_err(DatasetError::from)?;

        let written = async {
            let txn = self.db.begin().await?;
            for update in updates {
                update.update(&txn).await?;
            }
            flip_status(
                &txn,
                id,
                SubmissionStatus::Pending,
                SubmissionStatus::UnderReview,
                vec![
                    (
                        data_submissions::Column::ValidationResults,
                        Expr::value(results),
                    ),
                ],
            )
            .await?;
            txn.commit().await
        }
        .await;
        written.map_err(|e| WorkflowError::transaction_failed("validate submission", e))?;

        info!(
            "Validated submission {}: {} eligible ({} valid, {} warning), {} invalid ({} rules, {} skipped)",
            id,
            summary.eligible_rows(),
            summary.valid_rows,
            summary.warning_rows,
            summary.invalid_rows,
            summary.rules_evaluated,
            summary.rules_skipped
        );

        let submission = require_submission(&self.db, id).await?;
        Ok(ValidationReport {
            submission,
            summary,
        })
    }

    /// Record an admin's verdict on a submission under review.
    ///
    /// With `auto_apply_on_approve`, approval also applies the submission; a
    /// failed apply is reported in the outcome and leaves it `approved`.
    pub async fn review_submission(
        &self,
        identity: &Identity,
        id: i32,
        decision: ReviewDecision,
        notes: Option<&str>,
    ) -> WorkflowResult<ReviewOutcome> {
        identity.require_admin("review submissions")?;

        let submission = require_submission(&self.db, id).await?;
        let target = submission.get_status()?.transition(decision.target_status())?;
        let notes = notes
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(str::to_string);

        let now = Utc::now();
        let flipped = flip_status(
            &self.db,
            id,
            SubmissionStatus::UnderReview,
            target,
            vec![
                (
                    data_submissions::Column::ReviewedBy,
                    Expr::value(identity.user_id),
                ),
                (data_submissions::Column::ReviewedAt, Expr::value(now)),
                (data_submissions::Column::ReviewNotes, Expr::value(notes)),
            ],
        )
        .await;

        if let Err(e) = flipped {
            return Err(match self.current_status(id).await? {
                current if current != SubmissionStatus::UnderReview => {
                    WorkflowError::InvalidTransition {
                        from: current,
                        to: target,
                    }
                }
                _ => WorkflowError::Database(e),
            });
        }

        info!(
            "Submission {} {} by user {}",
            id, target, identity.user_id
        );

        if target == SubmissionStatus::Approved && self.workflow.auto_apply_on_approve {
            match self.apply(id).await {
                Ok(report) => {
                    return Ok(ReviewOutcome {
                        submission: report.submission.clone(),
                        applied: Some(report),
                        apply_error: None,
                    })
                }
                Err(e) => {
                    warn!("Automatic apply of submission {} failed: {}", id, e);
                    return Ok(ReviewOutcome {
                        submission: require_submission(&self.db, id).await?,
                        applied: None,
                        apply_error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(ReviewOutcome {
            submission: require_submission(&self.db, id).await?,
            applied: None,
            apply_error: None,
        })
    }

    /// Apply an approved submission on behalf of an admin
    pub async fn apply_submission(
        &self,
        identity: &Identity,
        id: i32,
    ) -> WorkflowResult<ApplyReport> {
        identity.require_admin("apply submissions")?;
        self.apply(id).await
    }

    /// Append the eligible staged rows to the dataset and mark the submission
    /// `applied`, all in one transaction.
    ///
    /// Unique fields are checked again against the rows the dataset holds at
    /// apply time; a clash is a `Conflict`. On any failure nothing is written
    /// and the submission stays `approved`.
    pub async fn apply(&self, id: i32) -> WorkflowResult<ApplyReport> {
        let submission = require_submission(&self.db, id).await?;
        submission.get_status()?.transition(SubmissionStatus::Applied)?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| WorkflowError::transaction_failed("apply submission", e))?;

        let applied = match apply_in_txn(&txn, &submission).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Apply of submission {} rolled back: {}", id, e);
                return Err(e);
            }
        };

        txn.commit()
            .await
            .map_err(|e| WorkflowError::transaction_failed("apply submission", e))?;

        info!(
            "Applied submission {}: {} rows appended to dataset {} (now {} rows)",
            id, applied.rows, submission.dataset_id, applied.dataset_row_count
        );

        Ok(ApplyReport {
            submission: require_submission(&self.db, id).await?,
            rows_applied: applied.rows,
            first_row_index: applied.first_row_index,
            dataset_row_count: applied.dataset_row_count,
        })
    }

    async fn current_status(&self, id: i32) -> WorkflowResult<SubmissionStatus> {
        Ok(require_submission(&self.db, id).await?.get_status()?)
    }
}

struct Applied {
    rows: usize,
    first_row_index: Option<i32>,
    dataset_row_count: i32,
}

async fn apply_in_txn<C: ConnectionTrait>(
    txn: &C,
    submission: &data_submissions::Model,
) -> WorkflowResult<Applied> {
    let failed = |e: DbErr| WorkflowError::transaction_failed("apply submission", e);
    let dataset_id = submission.dataset_id;
    require_ready_dataset(txn, dataset_id).await?;

    let eligible: Vec<Value> = staging_rows::Entity::find()
        .select_only()
        .column(staging_rows::Column::Data)
        .filter(staging_rows::Column::SubmissionId.eq(submission.id))
        .filter(staging_rows::Column::ValidationStatus.is_in([
            ValidationStatus::Valid.to_string(),
            ValidationStatus::Warning.to_string(),
        ]))
        .order_by_asc(staging_rows::Column::RowIndex)
        .into_tuple()
        .all(txn)
        .await
        .map_err(failed)?;

    recheck_unique(txn, dataset_id, &eligible).await?;

    let first_index = next_row_index(txn, dataset_id).await.map_err(failed)?;
    let rows = append_rows(txn, dataset_id, first_index, eligible, Some(submission.id))
        .await
        .map_err(failed)?;
    increment_row_count(txn, dataset_id, rows as i32)
        .await
        .map_err(failed)?;

    flip_status(
        txn,
        submission.id,
        SubmissionStatus::Approved,
        SubmissionStatus::Applied,
        vec![(
            data_submissions::Column::AppliedAt,
            Expr::value(Utc::now()),
        )],
    )
    .await
    .map_err(failed)?;

    let dataset = require_dataset(txn, dataset_id).await?;

    Ok(Applied {
        rows,
        first_row_index: (rows > 0).then_some(first_index),
        dataset_row_count: dataset.row_count,
    })
}

/// Rows applied since validation may have taken a unique value; reject the
/// apply if any eligible row now clashes
async fn recheck_unique<C: ConnectionTrait>(
    txn: &C,
    dataset_id: i32,
    eligible: &[Value],
) -> WorkflowResult<()> {
    let failed = |e: DbErr| WorkflowError::transaction_failed("apply submission", e);

    let Some(schema) = load_active_schema(txn, dataset_id).await.map_err(failed)? else {
        return Ok(());
    };
    let mut checker = SchemaChecker::new(schema.schema.id, &schema.fields);
    if !checker.has_unique_fields() || eligible.is_empty() {
        return Ok(());
    }

    let existing: Vec<Value> = dataset_rows::Entity::find()
        .select_only()
        .column(dataset_rows::Column::Data)
        .filter(dataset_rows::Column::DatasetId.eq(dataset_id))
        .into_tuple()
        .all(txn)
        .await
        .map_err(failed)?;
    for data in &existing {
        if let Ok(row) = row_from_json(data) {
            checker.seed_existing(&row);
        }
    }

    for data in eligible {
        let row = row_from_json(data).map_err(DatasetError::from)?;
        if let Some((field, value)) = checker.claim_unique(&row) {
            return Err(WorkflowError::Conflict(format!(
                "value '{}' for unique field '{}' is already in dataset {}",
                value, field, dataset_id
            )));
        }
    }
    Ok(())
}

/// Move a submission from `from` to `to`, only if it is still in `from`
async fn flip_status<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    from: SubmissionStatus,
    to: SubmissionStatus,
    extra: Vec<(data_submissions::Column, SimpleExpr)>,
) -> Result<(), DbErr> {
    let mut update = data_submissions::Entity::update_many()
        .col_expr(data_submissions::Column::Status, Expr::value(to.to_string()))
        .col_expr(data_submissions::Column::UpdatedAt, Expr::value(Utc::now()));
    for (column, value) in extra {
        update = update.col_expr(column, value);
    }

    let result = update
        .filter(data_submissions::Column::Id.eq(id))
        .filter(data_submissions::Column::Status.eq(from.to_string()))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(DbErr::Custom(format!(
            "submission {} is no longer {}",
            id, from
        )));
    }
    Ok(())
}

async fn require_submission<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> WorkflowResult<data_submissions::Model> {
    data_submissions::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Submission", id))
}
