use std::io;
use thiserror::Error;

/// Error taxonomy for the record store.
///
/// Bootstrap and cascade paths treat most of these as non-fatal (log and
/// continue); direct request paths return them to the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("missing dependency: {0}")]
    MissingDependency(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("uniqueness violation: {0}")]
    Duplicate(String),
    #[error("sync failed: {0}")]
    Sync(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// True for errors a bootstrap step may log and skip rather than
    /// failing the startup sequence.
    pub fn is_deferrable(&self) -> bool {
        matches!(self, StoreError::MissingDependency(_))
    }
}
