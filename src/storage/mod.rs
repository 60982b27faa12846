pub mod cached;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::{DatabaseBackend, DatabaseConfig};

pub use cached::CachedStorage;
pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{Storage, StorageError, StorageResult};

/// Open the configured backend and make sure its schema exists
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.url);
            Arc::new(
                SqliteStorage::new(&config.url, config.max_connections)
                    .await
                    .context("failed to open SQLite database")?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.url, config.max_connections)
                    .await
                    .context("failed to connect to PostgreSQL")?,
            )
        }
    };

    storage
        .init()
        .await
        .context("failed to initialize database schema")?;
    Ok(storage)
}
