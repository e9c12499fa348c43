// src/name.rs

//! Identifier validation and the protected-name set.
//!
//! Table and column names must match a conservative identifier pattern and
//! must not collide — case-insensitively — with the physical table names
//! this crate owns, the reserved column name `row_id`, or a small SQL
//! keyword blocklist.

use crate::error::{Error, Result};

/// Maximum identifier length.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Physical table names this crate owns outright — never usable as a
/// logical table or column name. Includes the optional boolean/json
/// partitions so a future extension can't collide with names already in
/// use.
const PROTECTED_TABLE_NAMES: &[&str] = &[
    "table_definitions",
    "column_definitions",
    "row_id_sequence",
    "schema_metadata",
    "text_values",
    "integer_values",
    "real_values",
    "timestamp_values",
    "boolean_values",
    "json_values",
];

/// The reserved column name every view projects regardless of schema.
const PROTECTED_COLUMN_NAME: &str = "row_id";

/// A conservative blocklist of SQL keywords that would be confusing or
/// dangerous as bare identifiers in generated SQL.
const RESERVED_KEYWORDS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "TRUNCATE", "RENAME", "INSERT", "UPDATE", "DELETE", "MERGE",
    "REPLACE", "GRANT", "REVOKE", "COMMIT", "ROLLBACK", "SAVEPOINT", "SELECT", "FROM", "WHERE",
    "TABLE", "COLUMN", "INDEX", "VIEW", "TRIGGER", "DATABASE", "SCHEMA", "AND", "OR", "NOT",
    "NULL", "CONSTRAINT", "KEY", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "DEFAULT", "ORDER",
    "GROUP", "HAVING", "LIMIT", "OFFSET", "JOIN", "INNER", "OUTER", "LEFT", "RIGHT", "CROSS",
    "UNION", "EXCEPT", "INTERSECT", "ALL", "ANY", "EXISTS", "INTEGER", "TEXT", "REAL", "BLOB",
    "NUMERIC", "PRAGMA", "ATTACH", "DETACH", "VACUUM", "ANALYZE",
];

fn is_identifier_shaped(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a proposed table or column name against the identifier pattern
/// and the protected-name set. Does not check for collisions with other
/// *live* catalog rows — that's the Metadata Store's job, since it needs a
/// database round trip.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LENGTH || !is_identifier_shaped(name) {
        return Err(Error::ReservedName(format!(
            "'{name}' is not a valid identifier (letter/underscore first, alphanumerics/underscore after, length <= {MAX_IDENTIFIER_LENGTH})"
        )));
    }

    let upper = name.to_ascii_uppercase();
    if RESERVED_KEYWORDS.contains(&upper.as_str()) {
        return Err(Error::ReservedName(format!(
            "'{name}' is a reserved SQL keyword"
        )));
    }

    let lower = name.to_ascii_lowercase();
    if PROTECTED_TABLE_NAMES.contains(&lower.as_str()) {
        return Err(Error::ReservedName(format!(
            "'{name}' conflicts with an internal SynthDB table"
        )));
    }
    if lower == PROTECTED_COLUMN_NAME {
        return Err(Error::ReservedName(format!(
            "'{name}' is reserved for the row identifier column"
        )));
    }

    Ok(())
}
