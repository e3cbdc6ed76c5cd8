use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::debug;

use crate::error::DbError;
use crate::schema;

/// Environment variable overriding the default database location.
pub const DB_PATH_ENV: &str = "CYHY_DB";

/// Persistent record store backed by SQLite.
pub struct RecordStore {
    pub(crate) conn: Connection,
}

/// Default database location: `$HOME/.cyhy/cyhy.db` (`%APPDATA%\cyhy\cyhy.db` on Windows).
pub fn default_db_path() -> PathBuf {
    if cfg!(windows) {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join("cyhy").join("cyhy.db")
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".cyhy").join("cyhy.db")
    }
}

impl RecordStore {
    /// Open a database at a specific path.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Other(format!(
                    "failed to create db directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        debug!(path = %path.display(), "record database opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

/// `?,?,?` with `n` anonymous placeholders, for `IN (...)` lists.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}
