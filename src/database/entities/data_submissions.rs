use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

use crate::workflow::SubmissionStatus;

/// A proposed batch of rows to append to a dataset.
///
/// `status` follows the state machine in [`crate::workflow`]; `applied_at` is
/// only ever set together with the `applied` status.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "data_submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub dataset_id: i32,
    pub submitted_by: i32,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub row_count: i32,
    pub content_hash: String,
    pub status: String,
    #[sea_orm(column_type = "Json", nullable)]
    pub validation_results: Option<Json>,
    pub review_notes: Option<String>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<ChronoDateTimeUtc>,
    pub applied_at: Option<ChronoDateTimeUtc>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::datasets::Entity",
        from = "Column::DatasetId",
        to = "super::datasets::Column::Id",
        on_delete = "Cascade"
    )]
    Datasets,
    #[sea_orm(has_many = "super::staging_rows::Entity")]
    StagingRows,
}

impl Related<super::datasets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Datasets.def()
    }
}

impl Related<super::staging_rows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StagingRows.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ActiveValue::NotSet,
            dataset_id: ActiveValue::NotSet,
            submitted_by: ActiveValue::NotSet,
            file_name: Set(None),
            file_path: Set(None),
            row_count: ActiveValue::NotSet,
            content_hash: ActiveValue::NotSet,
            status: Set(SubmissionStatus::Pending.as_ref().to_string()),
            validation_results: Set(None),
            review_notes: Set(None),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            applied_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }
}

impl Model {
    /// Parse the stored status column
    pub fn get_status(&self) -> Result<SubmissionStatus, DbErr> {
        self.status.parse().map_err(|_| {
            DbErr::Custom(format!(
                "Submission {} has unknown status '{}'",
                self.id, self.status
            ))
        })
    }
}
