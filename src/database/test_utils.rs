#[cfg(test)]
use sea_orm::{Database, DatabaseConnection};

#[cfg(test)]
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");

    crate::database::connection::setup_database(&db)
        .await
        .expect("Failed to run migrations");

    db
}

/// A project with one empty, ready dataset
#[cfg(test)]
pub async fn seed_dataset(db: &DatabaseConnection) -> crate::database::entities::datasets::Model {
    use crate::database::entities::{datasets, projects};
    use sea_orm::{ActiveModelTrait, Set};

    let now = chrono::Utc::now();
    let project = projects::ActiveModel {
        name: Set("Test project".to_string()),
        owner_id: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create project");

    datasets::ActiveModel {
        project_id: Set(project.id),
        name: Set("Test dataset".to_string()),
        description: Set(None),
        file_name: Set("test.csv".to_string()),
        file_format: Set("csv".to_string()),
        uploaded_by: Set(1),
        ..datasets::ActiveModel::new()
    }
    .set_ready(0, 0)
    .insert(db)
    .await
    .expect("Failed to create dataset")
}
