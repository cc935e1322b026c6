use std::sync::Arc;

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::Identity;
use crate::database::entities::common_types::FileFormat;
use crate::database::entities::{data_submissions, dataset_rows, datasets, projects};
use crate::errors::{DatasetError, WorkflowError, WorkflowResult};
use crate::ingest;
use crate::records::{row_from_json, row_to_json};
use crate::services::input::{validate_description, validate_name};
use crate::storage::FileStore;

/// Rows per multi-row INSERT; keeps statements under SQLite's variable limit
pub const ROW_INSERT_CHUNK: usize = 500;

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 1000;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RowQuery {
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Only rows whose `field` renders as `value`
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetRowView {
    pub row_index: i32,
    pub data: Value,
    pub source_submission_id: Option<i32>,
}

impl From<dataset_rows::Model> for DatasetRowView {
    fn from(row: dataset_rows::Model) -> Self {
        Self {
            row_index: row.row_index,
            data: row.data,
            source_submission_id: row.source_submission_id,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RowPage {
    pub dataset_id: i32,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    pub rows: Vec<DatasetRowView>,
}

#[derive(Clone)]
pub struct DatasetService {
    db: DatabaseConnection,
    store: Arc<dyn FileStore>,
}

impl DatasetService {
    pub fn new(db: DatabaseConnection, store: Arc<dyn FileStore>) -> Self {
        Self { db, store }
    }

    /// Create a dataset from an uploaded file.
    ///
    /// The dataset is recorded as `processing` first. A parse failure leaves
    /// it in `error` with the message; success stores every row and flips it
    /// to `ready` in one transaction.
    pub async fn upload_dataset(
        &self,
        identity: &Identity,
        project_id: i32,
        name: &str,
        description: Option<&str>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> WorkflowResult<datasets::Model> {
        projects::Entity::find_by_id(project_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Project", project_id))?;

        let name = validate_name("Dataset", name)?;
        let description = validate_description(description)?;
        let format = FileFormat::from_extension(file_name)
            .ok_or_else(|| DatasetError::UnsupportedFormat(file_name.to_string()))?;

        let file_path = self.store.save(file_name, &bytes).await?;

        let inserted = datasets::ActiveModel {
            project_id: Set(project_id),
            name: Set(name),
            description: Set(description),
            file_name: Set(file_name.to_string()),
            file_path: Set(Some(file_path.clone())),
            file_format: Set(format.as_ref().to_string()),
            file_size: Set(bytes.len() as i64),
            uploaded_by: Set(identity.user_id),
            ..datasets::ActiveModel::new()
        }
        .insert(&self.db)
        .await;

        let dataset = match inserted {
            Ok(dataset) => dataset,
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&file_path).await {
                    warn!("Failed to remove stored file {}: {}", file_path, cleanup);
                }
                return Err(WorkflowError::from_db("create dataset", e));
            }
        };

        info!(
            "Processing dataset {} ({}, {} bytes)",
            dataset.id, file_name, bytes.len()
        );

        let table = match ingest::parse_bytes(format, &bytes) {
            Ok(table) => table,
            Err(e) => {
                warn!("Dataset {} failed to parse: {}", dataset.id, e);
                let active: datasets::ActiveModel = dataset.into();
                active.set_error(e.to_string()).update(&self.db).await?;
                return Err(e.into());
            }
        };

        let row_count = table.row_count() as i32;
        let column_count = table.column_count() as i32;
        let documents: Vec<Value> = table.rows.iter().map(row_to_json).collect();
        let dataset_id = dataset.id;

        let stored = async {
            let txn = self.db.begin().await?;
            append_rows(&txn, dataset_id, 0, documents, None).await?;
            let active: datasets::ActiveModel = dataset.clone().into();
            let ready = active.set_ready(row_count, column_count).update(&txn).await?;
            txn.commit().await?;
            Ok::<_, DbErr>(ready)
        }
        .await;

        match stored {
            Ok(ready) => {
                info!(
                    "Dataset {} ready: {} rows, {} columns",
                    ready.id, row_count, column_count
                );
                Ok(ready)
            }
            Err(e) => {
                warn!("Dataset {} failed to store rows: {}", dataset_id, e);
                let active: datasets::ActiveModel = dataset.into();
                active.set_error(e.to_string()).update(&self.db).await?;
                Err(WorkflowError::transaction_failed("store dataset rows", e))
            }
        }
    }

    pub async fn list_datasets(&self, project_id: i32) -> WorkflowResult<Vec<datasets::Model>> {
        projects::Entity::find_by_id(project_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Project", project_id))?;

        let datasets = datasets::Entity::find()
            .filter(datasets::Column::ProjectId.eq(project_id))
            .order_by_asc(datasets::Column::Id)
            .all(&self.db)
            .await?;
        Ok(datasets)
    }

    pub async fn get_dataset(&self, id: i32) -> WorkflowResult<datasets::Model> {
        require_dataset(&self.db, id).await
    }

    /// Delete a dataset with its rows, schemas, rules and submissions.
    ///
    /// Stored upload files are removed afterwards; failures there are only
    /// logged.
    pub async fn delete_dataset(&self, identity: &Identity, id: i32) -> WorkflowResult<()> {
        let dataset = require_dataset_owner(&self.db, identity, id).await?;

        let submission_files: Vec<Option<String>> = data_submissions::Entity::find()
            .select_only()
            .column(data_submissions::Column::FilePath)
            .filter(data_submissions::Column::DatasetId.eq(id))
            .into_tuple()
            .all(&self.db)
            .await?;

        datasets::Entity::delete_by_id(id).exec(&self.db).await?;
        info!("Deleted dataset {} ({})", id, dataset.name);

        let files = dataset
            .file_path
            .into_iter()
            .chain(submission_files.into_iter().flatten());
        for file in files {
            if let Err(e) = self.store.delete(&file).await {
                warn!("Failed to remove stored file {}: {}", file, e);
            }
        }

        Ok(())
    }

    /// Page through stored rows in row_index order
    pub async fn query_rows(&self, dataset_id: i32, query: &RowQuery) -> WorkflowResult<RowPage> {
        require_dataset(&self.db, dataset_id).await?;

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let base = dataset_rows::Entity::find()
            .filter(dataset_rows::Column::DatasetId.eq(dataset_id))
            .order_by_asc(dataset_rows::Column::RowIndex);

        let (total, rows) = match (&query.field, &query.value) {
            (Some(field), Some(value)) => {
                // Compare on the canonical text form so "36" matches 36.0
                let matching: Vec<DatasetRowView> = base
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .filter(|row| {
                        row_from_json(&row.data)
                            .ok()
                            .and_then(|doc| doc.get(field).map(|v| v.to_text()))
                            .map_or(false, |text| &text == value)
                    })
                    .map(DatasetRowView::from)
                    .collect();
                let total = matching.len() as u64;
                let page: Vec<DatasetRowView> = matching
                    .into_iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .collect();
                (total, page)
            }
            (None, None) => {
                let total = base.clone().count(&self.db).await?;
                let page: Vec<DatasetRowView> = base
                    .offset(offset)
                    .limit(limit)
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(DatasetRowView::from)
                    .collect();
                (total, page)
            }
            _ => {
                return Err(WorkflowError::ValidationFailed(
                    "field and value must be given together".to_string(),
                ))
            }
        };

        debug!(
            "Dataset {} rows: {} of {} from offset {}",
            dataset_id,
            rows.len(),
            total,
            offset
        );

        Ok(RowPage {
            dataset_id,
            total,
            offset,
            limit,
            rows,
        })
    }
}

/// Load a dataset or fail with `NotFound`
pub(crate) async fn require_dataset<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> WorkflowResult<datasets::Model> {
    datasets::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Dataset", id))
}

/// Load a dataset the caller may change: the owner of its project, or an
/// admin
pub(crate) async fn require_dataset_owner<C: ConnectionTrait>(
    conn: &C,
    identity: &Identity,
    id: i32,
) -> WorkflowResult<datasets::Model> {
    let dataset = require_dataset(conn, id).await?;
    if identity.is_admin() {
        return Ok(dataset);
    }

    let project = projects::Entity::find_by_id(dataset.project_id)
        .one(conn)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Project", dataset.project_id))?;
    if project.owner_id != identity.user_id {
        return Err(WorkflowError::Forbidden(format!(
            "user {} does not own dataset {}",
            identity.user_id, id
        )));
    }
    Ok(dataset)
}

/// Load a dataset that accepts new rows; `processing` and `error` datasets
/// are a `Conflict`
pub(crate) async fn require_ready_dataset<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> WorkflowResult<datasets::Model> {
    let dataset = require_dataset(conn, id).await?;
    if !dataset.is_ready() {
        return Err(WorkflowError::Conflict(format!(
            "dataset {} is {}, not ready",
            id, dataset.status
        )));
    }
    Ok(dataset)
}

/// Index the next appended row of `dataset_id` gets: max existing + 1
pub(crate) async fn next_row_index<C: ConnectionTrait>(
    conn: &C,
    dataset_id: i32,
) -> Result<i32, DbErr> {
    let max: Option<Option<i32>> = dataset_rows::Entity::find()
        .select_only()
        .column_as(dataset_rows::Column::RowIndex.max(), "max_index")
        .filter(dataset_rows::Column::DatasetId.eq(dataset_id))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(max.flatten().map_or(0, |max| max + 1))
}

/// Insert row documents with consecutive indices starting at `first_index`
pub(crate) async fn append_rows<C: ConnectionTrait>(
    conn: &C,
    dataset_id: i32,
    first_index: i32,
    documents: Vec<Value>,
    source_submission_id: Option<i32>,
) -> Result<usize, DbErr> {
    let total = documents.len();
    let now = Utc::now();
    let mut next_index = first_index;
    let mut documents = documents.into_iter().peekable();

    while documents.peek().is_some() {
        let chunk: Vec<dataset_rows::ActiveModel> = documents
            .by_ref()
            .take(ROW_INSERT_CHUNK)
            .map(|data| {
                let row = dataset_rows::ActiveModel {
                    dataset_id: Set(dataset_id),
                    row_index: Set(next_index),
                    data: Set(data),
                    source_submission_id: Set(source_submission_id),
                    created_at: Set(now),
                    ..Default::default()
                };
                next_index += 1;
                row
            })
            .collect();
        dataset_rows::Entity::insert_many(chunk).exec(conn).await?;
    }

    Ok(total)
}

/// Bump `row_count` by `added` without reading it first
pub(crate) async fn increment_row_count<C: ConnectionTrait>(
    conn: &C,
    dataset_id: i32,
    added: i32,
) -> Result<(), DbErr> {
    datasets::Entity::update_many()
        .col_expr(
            datasets::Column::RowCount,
            Expr::col(datasets::Column::RowCount).add(added),
        )
        .col_expr(datasets::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(datasets::Column::Id.eq(dataset_id))
        .exec(conn)
        .await?;
    Ok(())
}
