use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::Identity;
use crate::common::sha256_hex;
use crate::database::entities::{data_submissions, staging_rows};
use crate::errors::{WorkflowError, WorkflowResult};
use crate::ingest;
use crate::records::{row_to_json, RowDocument};
use crate::services::dataset_service::{
    require_dataset, require_ready_dataset, ROW_INSERT_CHUNK,
};
use crate::storage::FileStore;
use crate::workflow::SubmissionStatus;

/// Accepts proposed rows for a dataset and stages them for review
#[derive(Clone)]
pub struct SubmissionService {
    db: DatabaseConnection,
    store: Arc<dyn FileStore>,
    max_rows: usize,
}

impl SubmissionService {
    pub fn new(db: DatabaseConnection, store: Arc<dyn FileStore>, max_rows: usize) -> Self {
        Self {
            db,
            store,
            max_rows,
        }
    }

    /// Stage the rows of an uploaded file
    pub async fn submit_file(
        &self,
        identity: &Identity,
        dataset_id: i32,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> WorkflowResult<data_submissions::Model> {
        require_ready_dataset(&self.db, dataset_id).await?;
        let table = ingest::parse_file(file_name, &bytes)?;
        let documents = self.prepare(dataset_id, &table.rows).await?;

        let file_path = self.store.save(file_name, &bytes).await?;
        let result = self
            .stage(
                identity,
                dataset_id,
                Some(file_name.to_string()),
                Some(file_path.clone()),
                documents,
            )
            .await;

        if result.is_err() {
            if let Err(e) = self.store.delete(&file_path).await {
                warn!("Failed to remove stored file {}: {}", file_path, e);
            }
        }
        result
    }

    /// Stage rows posted as JSON objects
    pub async fn submit_rows(
        &self,
        identity: &Identity,
        dataset_id: i32,
        rows: &[Value],
    ) -> WorkflowResult<data_submissions::Model> {
        require_ready_dataset(&self.db, dataset_id).await?;
        let rows = rows
            .iter()
            .enumerate()
            .map(|(index, row)| ingest::json_row(index, row))
            .collect::<Result<Vec<RowDocument>, _>>()?;
        let documents = self.prepare(dataset_id, &rows).await?;
        self.stage(identity, dataset_id, None, None, documents).await
    }

    /// Size checks and duplicate detection; returns the documents to stage
    /// with their content hash
    async fn prepare(
        &self,
        dataset_id: i32,
        rows: &[RowDocument],
    ) -> WorkflowResult<(Vec<Value>, String)> {
        if rows.is_empty() {
            return Err(WorkflowError::ValidationFailed(
                "Submission contains no rows".to_string(),
            ));
        }
        if rows.len() > self.max_rows {
            return Err(WorkflowError::ValidationFailed(format!(
                "Submission has {} rows; the limit is {}",
                rows.len(),
                self.max_rows
            )));
        }

        let documents: Vec<Value> = rows.iter().map(row_to_json).collect();
        let canonical = serde_json::to_vec(&documents).map_err(crate::errors::DatasetError::from)?;
        let content_hash = sha256_hex(&canonical);

        let duplicate = data_submissions::Entity::find()
            .filter(data_submissions::Column::DatasetId.eq(dataset_id))
            .filter(data_submissions::Column::ContentHash.eq(content_hash.as_str()))
            .filter(
                data_submissions::Column::Status
                    .is_in(SubmissionStatus::IN_FLIGHT.iter().map(|s| s.to_string())),
            )
            .one(&self.db)
            .await?;

        if let Some(existing) = duplicate {
            return Err(WorkflowError::Conflict(format!(
                "submission {} with identical rows is already {}",
                existing.id, existing.status
            )));
        }

        Ok((documents, content_hash))
    }

    /// Insert the submission and its staging rows in one transaction
    async fn stage(
        &self,
        identity: &Identity,
        dataset_id: i32,
        file_name: Option<String>,
        file_path: Option<String>,
        (documents, content_hash): (Vec<Value>, String),
    ) -> WorkflowResult<data_submissions::Model> {
        let row_count = documents.len();

        let staged = async {
            let txn = self.db.begin().await?;

            let submission = data_submissions::ActiveModel {
                dataset_id: Set(dataset_id),
                submitted_by: Set(identity.user_id),
                file_name: Set(file_name),
                file_path: Set(file_path),
                row_count: Set(row_count as i32),
                content_hash: Set(content_hash),
                ..data_submissions::ActiveModel::new()
            }
            .insert(&txn)
            .await?;

            let now = Utc::now();
            let mut documents = documents.into_iter().enumerate().peekable();
            while documents.peek().is_some() {
                let chunk: Vec<staging_rows::ActiveModel> = documents
                    .by_ref()
                    .take(ROW_INSERT_CHUNK)
                    .map(|(index, data)| staging_rows::ActiveModel {
                        submission_id: Set(submission.id),
                        row_index: Set(index as i32),
                        data: Set(data),
                        validation_status: Set(None),
                        validation_errors: Set(None),
                        created_at: Set(now),
                        ..Default::default()
                    })
                    .collect();
                staging_rows::Entity::insert_many(chunk).exec(&txn).await?;
            }

            txn.commit().await?;
            Ok::<_, DbErr>(submission)
        }
        .await
        .map_err(|e| WorkflowError::from_db("stage submission", e))?;

        info!(
            "Submission {} staged {} rows for dataset {} (user {})",
            staged.id, row_count, dataset_id, identity.user_id
        );
        Ok(staged)
    }

    /// Submissions of a dataset, newest first
    pub async fn list_submissions(
        &self,
        dataset_id: i32,
        status: Option<SubmissionStatus>,
    ) -> WorkflowResult<Vec<data_submissions::Model>> {
        require_dataset(&self.db, dataset_id).await?;
        let mut query = data_submissions::Entity::find()
            .filter(data_submissions::Column::DatasetId.eq(dataset_id));
        if let Some(status) = status {
            query = query.filter(data_submissions::Column::Status.eq(status.to_string()));
        }
        let submissions = query
            .order_by_desc(data_submissions::Column::Id)
            .all(&self.db)
            .await?;
        Ok(submissions)
    }

    pub async fn get_submission(&self, id: i32) -> WorkflowResult<data_submissions::Model> {
        data_submissions::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Submission", id))
    }

    /// Staged rows in row_index order
    pub async fn staged_rows(&self, submission_id: i32) -> WorkflowResult<Vec<staging_rows::Model>> {
        self.get_submission(submission_id).await?;
        let rows = staging_rows::Entity::find()
            .filter(staging_rows::Column::SubmissionId.eq(submission_id))
            .order_by_asc(staging_rows::Column::RowIndex)
            .all(&self.db)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::{seed_dataset, setup_test_db};
    use crate::storage::LocalFileStore;
    use serde_json::json;

    async fn setup(max_rows: usize) -> (SubmissionService, i32, tempfile::TempDir) {
        let db = setup_test_db().await;
        let dataset = seed_dataset(&db).await;
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).await.unwrap();
        (
            SubmissionService::new(db, Arc::new(store), max_rows),
            dataset.id,
            dir,
        )
    }

    #[tokio::test]
    async fn test_submit_file_stages_contiguous_rows() {
        let (service, dataset_id, _dir) = setup(100).await;

        let submission = service
            .submit_file(
                &Identity::member(4),
                dataset_id,
                "append.csv",
                b"id,name\n1,a\n2,b\n3,c\n".to_vec(),
            )
            .await
            .unwrap();

        assert_eq!(submission.status, "pending");
        assert_eq!(submission.row_count, 3);
        assert_eq!(submission.submitted_by, 4);
        assert_eq!(submission.content_hash.len(), 64);
        assert!(submission.file_path.is_some());

        let rows = service.staged_rows(submission.id).await.unwrap();
        let indices: Vec<i32> = rows.iter().map(|r| r.row_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(rows.iter().all(|r| r.validation_status.is_none()));
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_submission_conflicts() {
        let (service, dataset_id, _dir) = setup(100).await;
        let rows = vec![json!({"id": 1}), json!({"id": 2})];

        service
            .submit_rows(&Identity::member(1), dataset_id, &rows)
            .await
            .unwrap();
        let err = service
            .submit_rows(&Identity::member(2), dataset_id, &rows)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[tokio::test]
    async fn test_empty_and_oversized_submissions_are_rejected() {
        let (service, dataset_id, _dir) = setup(2).await;

        let err = service
            .submit_rows(&Identity::member(1), dataset_id, &[])
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");

        let rows = vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})];
        let err = service
            .submit_rows(&Identity::member(1), dataset_id, &rows)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_unknown_dataset_is_not_found() {
        let (service, _dataset_id, _dir) = setup(10).await;
        let err = service
            .submit_rows(&Identity::member(1), 404, &[json!({"id": 1})])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_submissions_by_status() {
        let (service, dataset_id, _dir) = setup(10).await;
        service
            .submit_rows(&Identity::member(1), dataset_id, &[json!({"id": 1})])
            .await
            .unwrap();

        let pending = service
            .list_submissions(dataset_id, Some(SubmissionStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        let applied = service
            .list_submissions(dataset_id, Some(SubmissionStatus::Applied))
            .await
            .unwrap();
        assert!(applied.is_empty());
    }
}
