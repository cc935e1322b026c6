use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::auth::Identity;
use crate::database::entities::business_rules;
use crate::database::entities::common_types::{RuleType, Severity};
use crate::errors::{WorkflowError, WorkflowResult};
use crate::services::dataset_service::require_dataset;
use crate::services::input::validate_name;
use crate::validation::RuleCheck;

#[derive(Clone, Debug, Deserialize)]
pub struct NewBusinessRule {
    pub rule_name: String,
    pub rule_type: RuleType,
    pub rule_config: Value,
    pub error_message: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Partial update; absent fields are left unchanged
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BusinessRuleUpdate {
    pub rule_name: Option<String>,
    pub rule_config: Option<Value>,
    pub error_message: Option<String>,
    pub severity: Option<Severity>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct BusinessRuleService {
    db: DatabaseConnection,
}

impl BusinessRuleService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_rule(
        &self,
        identity: &Identity,
        dataset_id: i32,
        rule: NewBusinessRule,
    ) -> WorkflowResult<business_rules::Model> {
        identity.require_admin("manage business rules")?;
        require_dataset(&self.db, dataset_id).await?;

        let rule_name = validate_name("Rule", &rule.rule_name)?;
        let error_message = validate_message(&rule.error_message)?;
        check_config(rule.rule_type, &rule.rule_config)?;

        let now = Utc::now();
        let model = business_rules::ActiveModel {
            dataset_id: Set(dataset_id),
            rule_name: Set(rule_name),
            rule_type: Set(rule.rule_type.as_ref().to_string()),
            rule_config: Set(rule.rule_config),
            error_message: Set(error_message),
            severity: Set(rule.severity.as_ref().to_string()),
            is_active: Set(rule.is_active),
            priority: Set(rule.priority),
            created_by: Set(identity.user_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| WorkflowError::from_db("create business rule", e))?;

        info!(
            "Created {} rule {} ({}) for dataset {} at priority {}",
            model.rule_type, model.id, model.rule_name, dataset_id, model.priority
        );
        Ok(model)
    }

    /// Rules of a dataset in evaluation order
    pub async fn list_rules(
        &self,
        dataset_id: i32,
        active_only: bool,
    ) -> WorkflowResult<Vec<business_rules::Model>> {
        require_dataset(&self.db, dataset_id).await?;
        let mut query =
            business_rules::Entity::find().filter(business_rules::Column::DatasetId.eq(dataset_id));
        if active_only {
            query = query.filter(business_rules::Column::IsActive.eq(true));
        }
        let rules = query
            .order_by_asc(business_rules::Column::Priority)
            .order_by_asc(business_rules::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rules)
    }

    pub async fn get_rule(&self, id: i32) -> WorkflowResult<business_rules::Model> {
        business_rules::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Business rule", id))
    }

    pub async fn update_rule(
        &self,
        identity: &Identity,
        id: i32,
        update: BusinessRuleUpdate,
    ) -> WorkflowResult<business_rules::Model> {
        identity.require_admin("manage business rules")?;
        let existing = self.get_rule(id).await?;
        let rule_type = existing.get_rule_type().ok_or_else(|| {
            WorkflowError::ValidationFailed(format!(
                "Rule {} has unknown type '{}'",
                id, existing.rule_type
            ))
        })?;

        let mut active: business_rules::ActiveModel = existing.into();

        if let Some(name) = update.rule_name {
            active.rule_name = Set(validate_name("Rule", &name)?);
        }
        if let Some(config) = update.rule_config {
            check_config(rule_type, &config)?;
            active.rule_config = Set(config);
        }
        if let Some(message) = update.error_message {
            active.error_message = Set(validate_message(&message)?);
        }
        if let Some(severity) = update.severity {
            active.severity = Set(severity.as_ref().to_string());
        }
        if let Some(priority) = update.priority {
            active.priority = Set(priority);
        }
        if let Some(is_active) = update.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&self.db).await?;
        info!("Updated business rule {} ({})", updated.id, updated.rule_name);
        Ok(updated)
    }

    pub async fn delete_rule(&self, identity: &Identity, id: i32) -> WorkflowResult<()> {
        identity.require_admin("manage business rules")?;
        let result = business_rules::Entity::delete_by_id(id)
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(WorkflowError::not_found("Business rule", id));
        }
        info!("Deleted business rule {}", id);
        Ok(())
    }
}

fn check_config(rule_type: RuleType, config: &Value) -> WorkflowResult<()> {
    RuleCheck::parse(rule_type, config)
        .map(|_| ())
        .map_err(WorkflowError::ValidationFailed)
}

fn validate_message(message: &str) -> WorkflowResult<String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::ValidationFailed(
            "Rule error_message cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Active rules of a dataset, as stored
pub(crate) async fn load_active_rules<C: ConnectionTrait>(
    conn: &C,
    dataset_id: i32,
) -> Result<Vec<business_rules::Model>, DbErr> {
    business_rules::Entity::find()
        .filter(business_rules::Column::DatasetId.eq(dataset_id))
        .filter(business_rules::Column::IsActive.eq(true))
        .order_by_asc(business_rules::Column::Priority)
        .order_by_asc(business_rules::Column::Id)
        .all(conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_utils::{self, setup_test_db};
    use serde_json::json;

    async fn seed_dataset(db: &DatabaseConnection) -> i32 {
        test_utils::seed_dataset(db).await.id
    }

    fn range_rule(priority: i32) -> NewBusinessRule {
        NewBusinessRule {
            rule_name: format!("age range {}", priority),
            rule_type: RuleType::RangeCheck,
            rule_config: json!({"field": "age", "min": 0}),
            error_message: "age must be positive".to_string(),
            severity: Severity::Error,
            priority,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_rules_are_listed_in_priority_order() {
        let db = setup_test_db().await;
        let dataset_id = seed_dataset(&db).await;
        let service = BusinessRuleService::new(db);
        let admin = Identity::admin(1);

        let late = service.create_rule(&admin, dataset_id, range_rule(20)).await.unwrap();
        let early = service.create_rule(&admin, dataset_id, range_rule(10)).await.unwrap();

        let ids: Vec<i32> = service
            .list_rules(dataset_id, false)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id]);

        service
            .update_rule(
                &admin,
                early.id,
                BusinessRuleUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let active = service.list_rules(dataset_id, true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, late.id);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let db = setup_test_db().await;
        let dataset_id = seed_dataset(&db).await;
        let service = BusinessRuleService::new(db);

        let mut rule = range_rule(1);
        rule.rule_config = json!({"field": "age"});
        let err = service
            .create_rule(&Identity::admin(1), dataset_id, rule)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_members_cannot_manage_rules() {
        let db = setup_test_db().await;
        let dataset_id = seed_dataset(&db).await;
        let service = BusinessRuleService::new(db);

        let err = service
            .create_rule(&Identity::member(2), dataset_id, range_rule(1))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_delete_rule() {
        let db = setup_test_db().await;
        let dataset_id = seed_dataset(&db).await;
        let service = BusinessRuleService::new(db);
        let admin = Identity::admin(1);
        let rule = service.create_rule(&admin, dataset_id, range_rule(1)).await.unwrap();

        service.delete_rule(&admin, rule.id).await.unwrap();
        assert!(service.delete_rule(&admin, rule.id).await.unwrap_err().is_not_found());
    }
}
