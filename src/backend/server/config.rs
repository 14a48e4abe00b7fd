/**
 * Storage Configuration
 *
 * Opens the pad store selected by `AppConfig::db_type`. SQL backends have
 * their schema created on connect.
 */
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::backend::error::BackendError;
use crate::backend::storage::{MemoryStore, SharedStore, SqlStore};
use crate::shared::config::DbType;
use crate::shared::AppConfig;

pub async fn load_store(config: &AppConfig) -> Result<SharedStore, BackendError> {
    let url = config.database_url();
    match (config.db_type, url) {
        (DbType::Memory, _) => {
            warn!("[Storage] Using in-memory store; pads are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        (DbType::Sqlite, Some(url)) => {
            info!("[Storage] Connecting to SQLite");
            let store = SqlStore::connect_sqlite(&url).await.map_err(|e| {
                error!("[Storage] SQLite connection failed: {}", e);
                BackendError::state(format!("sqlite: {}", e))
            })?;
            Ok(Arc::new(store))
        }
        (DbType::Postgres, Some(url)) => {
            info!("[Storage] Connecting to PostgreSQL");
            let store = SqlStore::connect_postgres(&url).await.map_err(|e| {
                error!("[Storage] PostgreSQL connection failed: {}", e);
                BackendError::state(format!("postgres: {}", e))
            })?;
            Ok(Arc::new(store))
        }
        (db_type, None) => Err(BackendError::state(format!(
            "database_url is required for {:?}",
            db_type
        ))),
    }
}
