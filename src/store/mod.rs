pub mod memory;
pub mod mysql;
pub mod sqlite;

use crate::core::config::{AppConfig, DatabaseBackend};
use crate::core::{RateStore, StoreError};
use anyhow::{Context, Result};
use memory::MemoryStore;
use mysql::MySqlStore;
use sqlite::SqliteStore;
use sqlx::Connection;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Opens the store selected by the configuration.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn RateStore>> {
    let timeout = config.database.timeout();

    let store: Arc<dyn RateStore> = match config.database_backend()? {
        DatabaseBackend::MySqlUrl(url) => {
            info!("Using MySQL store from connection URL (TLS required)");
            Arc::new(MySqlStore::from_url(&url, timeout)?)
        }
        DatabaseBackend::MySql(creds) => {
            info!(host = %creds.host, database = %creds.name, "Using MySQL store");
            Arc::new(MySqlStore::from_credentials(&creds, timeout))
        }
        DatabaseBackend::Sqlite(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            info!("Using SQLite store at {}", path.display());
            Arc::new(SqliteStore::new(&path, timeout))
        }
        DatabaseBackend::Memory => {
            info!("Using in-memory store; readings are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Runs a store operation under the configured deadline.
pub(crate) async fn bounded<T, F>(timeout: Duration, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, op)
        .await
        .map_err(|_| StoreError::Timeout(timeout))?
}

/// Closes a per-operation connection. Close failures are only logged since
/// the operation result is already known.
pub(crate) async fn release<C: Connection>(conn: C) {
    if let Err(e) = conn.close().await {
        debug!("Error while closing database connection: {}", e);
    }
}
