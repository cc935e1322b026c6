use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

pub use super::common_types::{DatasetStatus, FileFormat};

/// Uploaded tabular dataset.
///
/// Metadata only; the rows themselves live in `dataset_rows`. When `status`
/// is `ready`, `row_count` equals the number of stored row documents.
///
/// Related entities:
/// - `projects`: owning project
/// - `dataset_rows`: materialized rows
/// - `dataset_schemas`, `business_rules`, `data_submissions`: governance data
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "datasets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_path: Option<String>,
    pub file_format: String, // 'csv', 'tsv', 'json', 'xlsx', 'xls', 'ods'
    pub file_size: i64,
    pub row_count: i32,
    pub column_count: i32,
    pub status: String, // 'processing', 'ready', 'error'
    pub error_message: Option<String>,
    pub uploaded_by: i32,
    pub processed_at: Option<ChronoDateTimeUtc>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id",
        on_delete = "Cascade"
    )]
    Projects,
    #[sea_orm(has_many = "super::dataset_rows::Entity")]
    DatasetRows,
    #[sea_orm(has_many = "super::dataset_schemas::Entity")]
    DatasetSchemas,
    #[sea_orm(has_many = "super::data_submissions::Entity")]
    DataSubmissions,
    #[sea_orm(has_many = "super::business_rules::Entity")]
    BusinessRules,
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl Related<super::dataset_rows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DatasetRows.def()
    }
}

impl Related<super::dataset_schemas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DatasetSchemas.def()
    }
}

impl Related<super::data_submissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DataSubmissions.def()
    }
}

impl Related<super::business_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BusinessRules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ActiveValue::NotSet,
            project_id: ActiveValue::NotSet,
            name: ActiveValue::NotSet,
            description: ActiveValue::NotSet,
            file_name: ActiveValue::NotSet,
            file_path: Set(None),
            file_format: ActiveValue::NotSet,
            file_size: Set(0),
            row_count: Set(0),
            column_count: Set(0),
            status: Set(DatasetStatus::Processing.as_ref().to_string()),
            error_message: Set(None),
            uploaded_by: ActiveValue::NotSet,
            processed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    pub fn set_ready(mut self, row_count: i32, column_count: i32) -> Self {
        let now = chrono::Utc::now();
        self.row_count = Set(row_count);
        self.column_count = Set(column_count);
        self.status = Set(DatasetStatus::Ready.as_ref().to_string());
        self.error_message = Set(None);
        self.processed_at = Set(Some(now));
        self.updated_at = Set(now);
        self
    }

    pub fn set_error(mut self, error_msg: String) -> Self {
        self.status = Set(DatasetStatus::Error.as_ref().to_string());
        self.error_message = Set(Some(error_msg));
        self.updated_at = Set(chrono::Utc::now());
        self
    }
}

impl Model {
    pub fn get_status(&self) -> Option<DatasetStatus> {
        self.status.parse().ok()
    }

    pub fn get_file_format(&self) -> Option<FileFormat> {
        self.file_format.parse().ok()
    }

    pub fn is_ready(&self) -> bool {
        self.get_status() == Some(DatasetStatus::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Model {
        Model {
            id: 1,
            project_id: 1,
            name: "Customers".to_string(),
            description: None,
            file_name: "customers.csv".to_string(),
            file_path: None,
            file_format: "csv".to_string(),
            file_size: 120,
            row_count: 10,
            column_count: 3,
            status: "ready".to_string(),
            error_message: None,
            uploaded_by: 1,
            processed_at: Some(chrono::Utc::now()),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_model_status_helpers() {
        let model = sample();
        assert!(model.is_ready());
        assert_eq!(model.get_file_format(), Some(FileFormat::Csv));

        let processing = Model {
            status: "processing".to_string(),
            ..model
        };
        assert!(!processing.is_ready());
        assert_eq!(processing.get_status(), Some(DatasetStatus::Processing));
    }
}
