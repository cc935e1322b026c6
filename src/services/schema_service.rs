use std::collections::HashSet;

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Identity;
use crate::database::entities::common_types::DataType;
use crate::database::entities::{dataset_schemas, schema_fields};
use crate::errors::{WorkflowError, WorkflowResult};
use crate::services::dataset_service::{require_dataset, require_dataset_owner};
use crate::services::input::{validate_description, validate_field_name, validate_name};

/// Field declaration as submitted by a client
#[derive(Clone, Debug, Deserialize)]
pub struct NewSchemaField {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    /// Defaults to declaration order, or the next free slot when adding
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SchemaWithFields {
    #[serde(flatten)]
    pub schema: dataset_schemas::Model,
    pub fields: Vec<schema_fields::Model>,
}

#[derive(Clone)]
pub struct SchemaService {
    db: DatabaseConnection,
}

impl SchemaService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a schema with its fields; the new schema becomes the active one
    pub async fn create_schema(
        &self,
        identity: &Identity,
        dataset_id: i32,
        name: &str,
        description: Option<&str>,
        fields: Vec<NewSchemaField>,
    ) -> WorkflowResult<SchemaWithFields> {
        require_dataset_owner(&self.db, identity, dataset_id).await?;
        let name = validate_name("Schema", name)?;
        let description = validate_description(description)?;

        if fields.is_empty() {
            return Err(WorkflowError::ValidationFailed(
                "A schema needs at least one field".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut positions = HashSet::new();
        let mut prepared = Vec::with_capacity(fields.len());
        for (index, field) in fields.into_iter().enumerate() {
            let field_name = validate_field_name(&field.name)?;
            let position = field.position.unwrap_or(index as i32);
            if position < 0 {
                return Err(WorkflowError::ValidationFailed(format!(
                    "Field '{}' has a negative position",
                    field_name
                )));
            }
            if !names.insert(field_name.clone()) {
                return Err(WorkflowError::ValidationFailed(format!(
                    "Duplicate field name '{}'",
                    field_name
                )));
            }
            if !positions.insert(position) {
                return Err(WorkflowError::ValidationFailed(format!(
                    "Duplicate field position {}",
                    position
                )));
            }
            prepared.push((field_name, position, field));
        }

        let txn = self.db.begin().await?;

        deactivate_all(&txn, dataset_id).await?;

        let now = Utc::now();
        let schema = dataset_schemas::ActiveModel {
            dataset_id: Set(dataset_id),
            name: Set(name),
            description: Set(description),
            is_active: Set(true),
            created_by: Set(identity.user_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| WorkflowError::from_db("create schema", e))?;

        let mut stored = Vec::with_capacity(prepared.len());
        for (field_name, position, field) in prepared {
            let model = field_model(schema.id, field_name, position, &field)
                .insert(&txn)
                .await
                .map_err(|e| WorkflowError::from_db("create schema field", e))?;
            stored.push(model);
        }

        txn.commit().await?;

        stored.sort_by_key(|field| field.position);
        info!(
            "Created schema {} for dataset {} with {} fields",
            schema.id,
            dataset_id,
            stored.len()
        );

        Ok(SchemaWithFields {
            schema,
            fields: stored,
        })
    }

    pub async fn list_schemas(&self, dataset_id: i32) -> WorkflowResult<Vec<dataset_schemas::Model>> {
        require_dataset(&self.db, dataset_id).await?;
        let schemas = dataset_schemas::Entity::find()
            .filter(dataset_schemas::Column::DatasetId.eq(dataset_id))
            .order_by_asc(dataset_schemas::Column::Id)
            .all(&self.db)
            .await?;
        Ok(schemas)
    }

    pub async fn get_schema(&self, id: i32) -> WorkflowResult<SchemaWithFields> {
        let schema = require_schema(&self.db, id).await?;
        let fields = load_fields(&self.db, id).await?;
        Ok(SchemaWithFields { schema, fields })
    }

    /// Make `id` the only active schema of its dataset
    pub async fn activate_schema(
        &self,
        identity: &Identity,
        id: i32,
    ) -> WorkflowResult<dataset_schemas::Model> {
        let schema = require_schema(&self.db, id).await?;
        require_dataset_owner(&self.db, identity, schema.dataset_id).await?;

        let txn = self.db.begin().await?;
        deactivate_all(&txn, schema.dataset_id).await?;
        let mut active: dataset_schemas::ActiveModel = schema.into();
        active.is_active = Set(true);
        active.updated_at = Set(Utc::now());
        let schema = active.update(&txn).await?;
        txn.commit().await?;

        info!("Activated schema {} for dataset {}", schema.id, schema.dataset_id);
        Ok(schema)
    }

    pub async fn add_field(
        &self,
        identity: &Identity,
        schema_id: i32,
        field: NewSchemaField,
    ) -> WorkflowResult<schema_fields::Model> {
        let schema = require_schema(&self.db, schema_id).await?;
        require_dataset_owner(&self.db, identity, schema.dataset_id).await?;
        let field_name = validate_field_name(&field.name)?;

        let position = match field.position {
            Some(position) if position < 0 => {
                return Err(WorkflowError::ValidationFailed(format!(
                    "Field '{}' has a negative position",
                    field_name
                )))
            }
            Some(position) => position,
            None => next_position(&self.db, schema_id).await?,
        };

        let model = field_model(schema_id, field_name, position, &field)
            .insert(&self.db)
            .await
            .map_err(|e| WorkflowError::from_db("add schema field", e))?;

        info!(
            "Added field '{}' to schema {} at position {}",
            model.name, schema_id, model.position
        );
        Ok(model)
    }

    /// Exchange the positions of two fields of the same schema atomically
    pub async fn swap_field_positions(
        &self,
        identity: &Identity,
        schema_id: i32,
        first_field_id: i32,
        second_field_id: i32,
    ) -> WorkflowResult<Vec<schema_fields::Model>> {
        if first_field_id == second_field_id {
            return Err(WorkflowError::ValidationFailed(
                "Cannot swap a field with itself".to_string(),
            ));
        }
        let schema = require_schema(&self.db, schema_id).await?;
        require_dataset_owner(&self.db, identity, schema.dataset_id).await?;

        let txn = self.db.begin().await?;

        let first = require_field(&txn, schema_id, first_field_id).await?;
        let second = require_field(&txn, schema_id, second_field_id).await?;

        // Park the first field so the unique (schema_id, position) index holds
        set_position(&txn, first.id, -1)
            .await
            .map_err(|e| WorkflowError::transaction_failed("swap field positions", e))?;
        set_position(&txn, second.id, first.position)
            .await
            .map_err(|e| WorkflowError::transaction_failed("swap field positions", e))?;
        set_position(&txn, first.id, second.position)
            .await
            .map_err(|e| WorkflowError::transaction_failed("swap field positions", e))?;

        txn.commit()
            .await
            .map_err(|e| WorkflowError::transaction_failed("swap field positions", e))?;

        info!(
            "Swapped positions of fields {} and {} in schema {}",
            first.id, second.id, schema_id
        );
        Ok(load_fields(&self.db, schema_id).await?)
    }
}

fn field_model(
    schema_id: i32,
    name: String,
    position: i32,
    field: &NewSchemaField,
) -> schema_fields::ActiveModel {
    schema_fields::ActiveModel {
        schema_id: Set(schema_id),
        name: Set(name),
        data_type: Set(field.data_type.as_ref().to_string()),
        is_required: Set(field.is_required),
        is_unique: Set(field.is_unique),
        position: Set(position),
        description: Set(field.description.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
}

async fn deactivate_all<C: ConnectionTrait>(conn: &C, dataset_id: i32) -> Result<(), DbErr> {
    dataset_schemas::Entity::update_many()
        .col_expr(dataset_schemas::Column::IsActive, Expr::value(false))
        .col_expr(dataset_schemas::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(dataset_schemas::Column::DatasetId.eq(dataset_id))
        .filter(dataset_schemas::Column::IsActive.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

async fn set_position<C: ConnectionTrait>(conn: &C, field_id: i32, position: i32) -> Result<(), DbErr> {
    schema_fields::Entity::update_many()
        .col_expr(schema_fields::Column::Position, Expr::value(position))
        .filter(schema_fields::Column::Id.eq(field_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn next_position<C: ConnectionTrait>(conn: &C, schema_id: i32) -> Result<i32, DbErr> {
    let max: Option<Option<i32>> = schema_fields::Entity::find()
        .select_only()
        .column_as(schema_fields::Column::Position.max(), "max_position")
        .filter(schema_fields::Column::SchemaId.eq(schema_id))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(max.flatten().map_or(0, |max| max + 1))
}

async fn require_schema<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> WorkflowResult<dataset_schemas::Model> {
    dataset_schemas::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Schema", id))
}

async fn require_field<C: ConnectionTrait>(
    conn: &C,
    schema_id: i32,
    field_id: i32,
) -> WorkflowResult<schema_fields::Model> {
    schema_fields::Entity::find_by_id(field_id)
        .filter(schema_fields::Column::SchemaId.eq(schema_id))
        .one(conn)
        .await?
        .ok_or_else(|| WorkflowError::not_found("Schema field", field_id))
}

async fn load_fields<C: ConnectionTrait>(
    conn: &C,
    schema_id: i32,
) -> Result<Vec<schema_fields::Model>, DbErr> {
    schema_fields::Entity::find()
        .filter(schema_fields::Column::SchemaId.eq(schema_id))
        .order_by_asc(schema_fields::Column::Position)
        .all(conn)
        .await
}

/// The active schema of a dataset with its fields in position order
pub(crate) async fn load_active_schema<C: ConnectionTrait>(
    conn: &C,
    dataset_id: i32,
) -> Result<Option<SchemaWithFields>, DbErr> {
    let schema = dataset_schemas::Entity::find()
        .filter(dataset_schemas::Column::DatasetId.eq(dataset_id))
        .filter(dataset_schemas::Column::IsActive.eq(true))
        .order_by_desc(dataset_schemas::Column::Id)
        .one(conn)
        .await?;

    match schema {
        Some(schema) => {
            let fields = load_fields(conn, schema.id).await?;
            Ok(Some(SchemaWithFields { schema, fields }))
        }
        None => Ok(None),
    }
}
