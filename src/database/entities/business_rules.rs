use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::common_types::{RuleType, Severity};

/// Configurable validation check evaluated after schema typing.
///
/// Rules run in ascending `priority` order; `is_active = false` disables a
/// rule without deleting it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "business_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub dataset_id: i32,
    pub rule_name: String,
    pub rule_type: String,
    #[sea_orm(column_type = "Json")]
    pub rule_config: Json,
    pub error_message: String,
    pub severity: String,
    pub is_active: bool,
    pub priority: i32,
    pub created_by: i32,
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
}

impl Related<super::datasets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Datasets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn get_rule_type(&self) -> Option<RuleType> {
        self.rule_type.parse().ok()
    }

    pub fn get_severity(&self) -> Severity {
        self.severity.parse().unwrap_or_default()
    }
}
