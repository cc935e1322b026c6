use sea_orm_migration::prelude::*;

mod m001_create_projects_and_datasets;
mod m002_create_dataset_schemas;
mod m003_create_submission_workflow;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m001_create_projects_and_datasets::Migration),
            Box::new(m002_create_dataset_schemas::Migration),
            Box::new(m003_create_submission_workflow::Migration),
        ]
    }
}
