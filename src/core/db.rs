use crate::core::error::StoreError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the store's database file inside the data directory.
pub const DB_FILE_NAME: &str = "data.db";

/// Open a connection with the store's standard pragmas: WAL journaling,
/// a busy timeout for cross-process contention, and foreign key
/// enforcement (relation cascade deletes depend on it).
pub fn db_connect(db_path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn store_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILE_NAME)
}
