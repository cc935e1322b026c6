use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::common_types::DataType;

/// A column declaration; `name` and `position` are unique within a schema
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schema_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub schema_id: i32,
    pub name: String,
    pub data_type: String, // 'string', 'number', 'date', 'boolean', 'email', 'url'
    pub is_required: bool,
    pub is_unique: bool,
    pub position: i32,
    pub description: Option<String>,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dataset_schemas::Entity",
        from = "Column::SchemaId",
        to = "super::dataset_schemas::Column::Id",
        on_delete = "Cascade"
    )]
    DatasetSchemas,
}

impl Related<super::dataset_schemas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DatasetSchemas.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn get_data_type(&self) -> Option<DataType> {
        self.data_type.parse().ok()
    }
}
