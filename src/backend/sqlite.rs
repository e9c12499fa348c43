// src/backend/sqlite.rs

//! The sole concrete backend adapter: a local SQLite-family file.
//!
//! Connection setup applies WAL journaling, `NORMAL` synchronous mode, a
//! generous page/cache size on fresh databases, and a busy timeout so
//! concurrent connections serialize instead of failing immediately.

use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::metadata::model::DataType;

use super::Backend;

/// Backend Adapter for local SQLite-family database files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn sql_type(&self, logical_type: DataType) -> &'static str {
        match logical_type {
            DataType::Text => "TEXT",
            DataType::Integer => "INTEGER",
            DataType::Real => "REAL",
            DataType::Timestamp => "TEXT",
        }
    }

    fn autoincrement_decl(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }
}

/// Open (creating if necessary) a SQLite database file and apply the
/// advisory performance pragmas. These tune durability/throughput
/// trade-offs only — correctness never depends on them.
pub fn connect(path: &Path) -> Result<Connection> {
    let is_new = !path.exists();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    if is_new {
        debug!(path = %path.display(), "tuning freshly created database");
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA page_size = 8192;
            PRAGMA cache_size = -65536;
            ",
        )?;
    }

    Ok(conn)
}

/// Open an in-memory database, used by tests and by callers that want an
/// ephemeral scratch instance.
pub fn connect_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn connect_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/db.sqlite");
        let conn = connect(&path).unwrap();
        assert!(path.exists());
        drop(conn);
    }

    #[test]
    fn connect_applies_pragmas_on_fresh_db() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_path_buf();
        drop(temp);

        let conn = connect(&path).unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");

        let foreign_keys: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn reports_sqlite_capabilities() {
        let backend = SqliteBackend;
        assert!(backend.supports_returning());
        assert_eq!(backend.sql_type(DataType::Integer), "INTEGER");
        assert_eq!(backend.sql_type(DataType::Timestamp), "TEXT");
    }
}
