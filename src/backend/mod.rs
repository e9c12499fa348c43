// src/backend/mod.rs

//! Backend Adapter.
//!
//! Abstracts the local, file-based embedded SQL engine SynthDB assumes
//! (SQLite-family semantics: statement-level atomicity, transactions,
//! views, `RETURNING`, PRAGMA-style tuning). `rusqlite::Connection` already
//! provides the execute/fetchone/fetchall/commit/rollback/close contract
//! directly, so the only backend-specific surface left to abstract is
//! capability reporting and logical-to-SQL type mapping.

pub mod sqlite;

pub use sqlite::SqliteBackend;

use crate::metadata::model::DataType;

/// Capability and DDL-mapping contract a SQL backend must provide.
pub trait Backend {
    /// Human-readable backend name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the backend supports the `RETURNING` clause.
    fn supports_returning(&self) -> bool;

    /// Map a logical data type to this backend's SQL column type.
    fn sql_type(&self, logical_type: DataType) -> &'static str;

    /// DDL fragment for a surrogate autoincrement id column, if the
    /// backend needs one.
    fn autoincrement_decl(&self) -> &'static str;
}
