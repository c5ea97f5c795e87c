use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::SimpleAsyncConnection;

use crate::error::{RemindMeError, Result};

const BUSY_TIMEOUT_PRAGMA: &str = "PRAGMA busy_timeout = 5000;";
const DURABILITY_PRAGMAS: &str = "PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL;";

pub fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RemindMeError::Storage(format!(
                    "Failed to create database directory {}: {e}",
                    parent.to_string_lossy()
                ))
            })?;
        }
    }
    Ok(())
}

pub fn open_connection_sync(database_url: &str) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)
        .map_err(|e| RemindMeError::Storage(e.to_string()))?;
    conn.batch_execute(BUSY_TIMEOUT_PRAGMA)
        .map_err(|e| RemindMeError::Storage(e.to_string()))?;
    if let Err(err) = conn.batch_execute(DURABILITY_PRAGMAS) {
        tracing::debug!("Unable to switch sqlite to WAL: {}", err);
    }
    Ok(conn)
}

pub async fn apply_pragmas_async(conn: &mut SyncConnectionWrapper<SqliteConnection>) -> Result<()> {
    conn.batch_execute(BUSY_TIMEOUT_PRAGMA)
        .await
        .map_err(|e| RemindMeError::Storage(e.to_string()))?;
    conn.batch_execute("PRAGMA synchronous = FULL;")
        .await
        .map_err(|e| RemindMeError::Storage(e.to_string()))?;
    Ok(())
}
