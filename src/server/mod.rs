pub mod app;
pub mod error;
pub mod extract;
pub mod handlers;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use sea_orm_migration::prelude::*;
use tracing::info;

use crate::config::AppConfig;
use crate::database::{connection::*, migrations::Migrator};
use crate::storage::LocalFileStore;

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let db = connect(&config.database).await?;

    setup_database(&db).await?;
    info!("Database migrations completed");

    let store = LocalFileStore::new(Path::new(&config.storage.upload_dir))
        .await
        .with_context(|| format!("Failed to prepare upload dir {}", config.storage.upload_dir))?;

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let app = app::create_app(db, config, Arc::new(store)).await?;

    log_routes();

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Server running on http://{}", address);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes() {
    info!("API Endpoints:");
    info!("  /health                          - Health check");
    info!("  /api/v1/projects                 - Projects and their datasets");
    info!("  /api/v1/datasets/:id/rows        - Dataset rows");
    info!("  /api/v1/datasets/:id/schemas     - Schemas and fields");
    info!("  /api/v1/datasets/:id/rules       - Business rules");
    info!("  /api/v1/datasets/:id/submissions - Submission intake");
    info!("  /api/v1/submissions/:id/*        - Validate, review, apply");
}

pub async fn migrate_database(config: &AppConfig, direction: MigrateDirection) -> Result<()> {
    let db = connect(&config.database).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
