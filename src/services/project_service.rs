use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::info;

use crate::auth::Identity;
use crate::database::entities::projects;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::services::input::{validate_description, validate_name};

#[derive(Clone)]
pub struct ProjectService {
    db: DatabaseConnection,
}

impl ProjectService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a project owned by the caller
    pub async fn create_project(
        &self,
        identity: &Identity,
        name: &str,
        description: Option<&str>,
    ) -> WorkflowResult<projects::Model> {
        let name = validate_name("Project", name)?;
        let description = validate_description(description)?;

        let now = Utc::now();
        let project = projects::ActiveModel {
            name: Set(name),
            description: Set(description),
            owner_id: Set(identity.user_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let project = project
            .insert(&self.db)
            .await
            .map_err(|e| WorkflowError::from_db("create project", e))?;

        info!("Created project {} ({})", project.id, project.name);
        Ok(project)
    }

    pub async fn list_projects(&self) -> WorkflowResult<Vec<projects::Model>> {
        let projects = projects::Entity::find()
            .order_by_asc(projects::Column::Id)
            .all(&self.db)
            .await?;
        Ok(projects)
    }

    pub async fn get_project(&self, id: i32) -> WorkflowResult<projects::Model> {
        projects::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Project", id))
    }

    /// Delete a project and, through the foreign keys, everything under it.
    ///
    /// Only the owner or an admin may delete.
    pub async fn delete_project(&self, identity: &Identity, id: i32) -> WorkflowResult<()> {
        let project = self.get_project(id).await?;

        if project.owner_id != identity.user_id && !identity.is_admin() {
            return Err(WorkflowError::Forbidden(format!(
                "user {} does not own project {}",
                identity.user_id, id
            )));
        }

        projects::Entity::delete_by_id(project.id)
            .exec(&self.db)
            .await?;

        info!("Deleted project {} ({})", project.id, project.name);
        Ok(())
    }
}
