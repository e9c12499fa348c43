// src/error.rs

use thiserror::Error;

/// Core error types for SynthDB.
#[derive(Error, Debug)]
pub enum Error {
    /// A live catalog row with that name already exists.
    #[error("name already taken: {0}")]
    NameTaken(String),

    /// Name collides with a protected name or violates the identifier pattern.
    #[error("reserved name: {0}")]
    ReservedName(String),

    /// No live table matches.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// No live column matches.
    #[error("column not found: {table}.{column}")]
    ColumnNotFound {
        /// Owning table name.
        table: String,
        /// Missing column name.
        column: String,
    },

    /// `data_type` is not in the supported set.
    #[error("unknown data type: {0}")]
    UnknownType(String),

    /// Value cannot be converted to the declared type.
    #[error("cannot coerce value to {target_type}: {reason}")]
    TypeCoercion {
        /// Target logical type.
        target_type: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Concurrent upsert serialization failure; caller may retry.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// Underlying engine/driver error.
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    /// I/O error (filesystem, branch config, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal check failed; should never occur.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// `SQLITE_BUSY`/`SQLITE_LOCKED` surface as `Conflict` — the caller's cue
/// to retry — rather than as an opaque `Database` error; every other
/// driver error passes through unchanged.
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, _) = &err {
            if matches!(
                ffi_err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return Error::Conflict(err.to_string());
            }
        }
        Error::Database(err)
    }
}

/// Result type alias using SynthDB's Error type.
pub type Result<T> = std::result::Result<T, Error>;
