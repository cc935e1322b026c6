use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::common_types::ValidationStatus;

/// Candidate row of a submission; `validation_status` is null until the
/// validation pass has run
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "staging_rows")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub submission_id: i32,
    pub row_index: i32,
    #[sea_orm(column_type = "Json")]
    pub data: Json,
    pub validation_status: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub validation_errors: Option<Json>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::data_submissions::Entity",
        from = "Column::SubmissionId",
        to = "super::data_submissions::Column::Id",
        on_delete = "Cascade"
    )]
    DataSubmissions,
}

impl Related<super::data_submissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DataSubmissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn get_validation_status(&self) -> Option<ValidationStatus> {
        self.validation_status.as_deref()?.parse().ok()
    }

    /// Validated and not marked invalid
    pub fn is_eligible_for_apply(&self) -> bool {
        self.get_validation_status()
            .map(|status| status.is_eligible_for_apply())
            .unwrap_or(false)
    }
}
