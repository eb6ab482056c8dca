use std::sync::Arc;

use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::store::{DbStore, MemoryStore, Store};

pub async fn connect(config: &Config) -> AppResult<DatabaseConnection> {
    Database::connect(&config.database_url)
        .await
        .map_err(|e| AppError::StoreUnavailable(format!("Failed to connect to database: {}", e)))
}

/// Build the configured store, running migrations for a real database.
pub async fn open_store(config: &Config) -> AppResult<Arc<dyn Store>> {
    if config.uses_memory_store() {
        tracing::warn!("Using in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = connect(config).await?;
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Migrations complete");

    Ok(Arc::new(DbStore::new(db)))
}
