// src/cell_store.rs

//! Versioned Cell Store.
//!
//! Implements the atomic upsert / soft-delete / read-current protocol
//! against the four type-partitioned physical tables.
//!
//! Cell-level delete remains here because `delete_row` is built out of it,
//! but it is not part of the public `Connection` surface.

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Error, Result};
use crate::metadata::model::{ColumnDefinition, DataType};
use crate::value::Value;

/// One cell's audit-trail entry.
#[derive(Debug, Clone)]
pub struct CellVersion {
    pub version: i64,
    pub value: Option<Value>,
    pub created_at: String,
    pub is_deleted: bool,
    pub is_current: bool,
}

/// A cell's current value, read via the programmatic path.
#[derive(Debug, Clone)]
pub struct CurrentCell {
    pub value: Option<Value>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub version: i64,
}

/// Coerce a caller-supplied value to the declared column type, per the
/// coercion table below. `force_type` permits numeric-to-text coercion
/// only; every other cross-type conversion is rejected regardless of it.
pub fn coerce(target: DataType, value: &Value, force_type: bool) -> Result<Value> {
    match (target, value) {
        (DataType::Text, Value::Text(s)) => Ok(Value::Text(s.clone())),
        (DataType::Text, other) if force_type => Ok(Value::Text(stringify(other))),
        (DataType::Text, _) => Err(coercion_error(
            target,
            "text columns accept string values directly; pass force_type to stringify others",
        )),

        (DataType::Integer, Value::Integer(i)) => Ok(Value::Integer(*i)),
        (DataType::Integer, Value::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| coercion_error(target, &format!("'{s}' is not an integer"))),
        (DataType::Integer, Value::Real(_)) => {
            Err(coercion_error(target, "fractional numbers are not integers"))
        }
        (DataType::Integer, _) => Err(coercion_error(target, "value is not integer-shaped")),

        (DataType::Real, Value::Real(f)) => Ok(Value::Real(*f)),
        (DataType::Real, Value::Integer(i)) => Ok(Value::Real(*i as f64)),
        (DataType::Real, Value::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Real)
            .map_err(|_| coercion_error(target, &format!("'{s}' is not numeric"))),
        (DataType::Real, _) => Err(coercion_error(target, "value is not numeric")),

        (DataType::Timestamp, Value::Timestamp(s)) => normalize_timestamp(s),
        (DataType::Timestamp, Value::Text(s)) => normalize_timestamp(s),
        (DataType::Timestamp, _) => Err(coercion_error(target, "value is not a timestamp")),
    }
}

fn coercion_error(target: DataType, reason: &str) -> Error {
    Error::TypeCoercion {
        target_type: target.as_str().to_string(),
        reason: reason.to_string(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Timestamp(s) => s.clone(),
    }
}

const CANONICAL_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.3f",
    "%Y-%m-%dT%H:%M:%S%.3f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

fn normalize_timestamp(raw: &str) -> Result<Value> {
    for fmt in CANONICAL_TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Value::timestamp(dt));
        }
    }
    Err(coercion_error(
        DataType::Timestamp,
        &format!("'{raw}' is not a recognizable timestamp"),
    ))
}

/// Atomic upsert. Demotes any current row for the cell — live or
/// a tombstone — then inserts a new current, non-deleted row at the next
/// version. Returns the new version number.
pub fn upsert_cell(
    conn: &Connection,
    row_id: &str,
    table_id: i64,
    column_id: i64,
    data_type: DataType,
    value: &Value,
    force_type: bool,
) -> Result<i64> {
    let table = data_type.table_name();
    let coerced = coerce(data_type, value, force_type)?;

    conn.execute(
        &format!(
            "UPDATE {table} SET is_current = 0 \
             WHERE row_id = ?1 AND table_id = ?2 AND column_id = ?3 AND is_current = 1"
        ),
        params![row_id, table_id, column_id],
    )?;

    let next_version: i64 = conn.query_row(
        &format!(
            "SELECT COALESCE(MAX(version), -1) + 1 FROM {table} \
             WHERE row_id = ?1 AND table_id = ?2 AND column_id = ?3"
        ),
        params![row_id, table_id, column_id],
        |row| row.get(0),
    )?;

    bind_insert(
        conn,
        table,
        row_id,
        table_id,
        column_id,
        next_version,
        &coerced,
    )?;

    Ok(next_version)
}

fn bind_insert(
    conn: &Connection,
    table: &str,
    row_id: &str,
    table_id: i64,
    column_id: i64,
    version: i64,
    value: &Value,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {table} (row_id, table_id, column_id, version, value, is_current, is_deleted) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1, 0)"
    );
    match value {
        Value::Text(s) => conn.execute(&sql, params![row_id, table_id, column_id, version, s])?,
        Value::Integer(i) => {
            conn.execute(&sql, params![row_id, table_id, column_id, version, i])?
        }
        Value::Real(f) => conn.execute(&sql, params![row_id, table_id, column_id, version, f])?,
        Value::Timestamp(s) => {
            conn.execute(&sql, params![row_id, table_id, column_id, version, s])?
        }
    };
    Ok(())
}

/// Soft delete the current value of a single cell. Leaves the
/// tombstone row current — no new version is written. Returns whether a
/// row was affected.
pub(crate) fn delete_value(
    conn: &Connection,
    row_id: &str,
    table_id: i64,
    column_id: i64,
    data_type: DataType,
) -> Result<bool> {
    let table = data_type.table_name();
    let changed = conn.execute(
        &format!(
            "UPDATE {table} SET is_deleted = 1, deleted_at = strftime('%Y-%m-%d %H:%M:%f', 'now') \
             WHERE row_id = ?1 AND table_id = ?2 AND column_id = ?3 \
             AND is_current = 1 AND is_deleted = 0"
        ),
        params![row_id, table_id, column_id],
    )?;
    Ok(changed > 0)
}

/// Clear a tombstone back to live, in place, without a new version
/// (the mirror operation of `delete_value`, used by `undelete_row`).
pub(crate) fn undelete_value(
    conn: &Connection,
    row_id: &str,
    table_id: i64,
    column_id: i64,
    data_type: DataType,
) -> Result<bool> {
    let table = data_type.table_name();
    let changed = conn.execute(
        &format!(
            "UPDATE {table} SET is_deleted = 0, deleted_at = NULL \
             WHERE row_id = ?1 AND table_id = ?2 AND column_id = ?3 \
             AND is_current = 1 AND is_deleted = 1"
        ),
        params![row_id, table_id, column_id],
    )?;
    Ok(changed > 0)
}

/// Read a cell's current value. Excludes tombstones unless
/// `include_deleted` is set.
pub fn read_current(
    conn: &Connection,
    row_id: &str,
    table_id: i64,
    column_id: i64,
    data_type: DataType,
    include_deleted: bool,
) -> Result<Option<CurrentCell>> {
    let table = data_type.table_name();
    let deleted_clause = if include_deleted { "" } else { "AND is_deleted = 0" };
    let sql = format!(
        "SELECT value, is_deleted, deleted_at, created_at, version FROM {table} \
         WHERE row_id = ?1 AND table_id = ?2 AND column_id = ?3 AND is_current = 1 {deleted_clause}"
    );

    conn.query_row(&sql, params![row_id, table_id, column_id], |row| {
        let is_deleted: i64 = row.get("is_deleted")?;
        Ok(CurrentCell {
            value: read_typed_value(row, data_type)?,
            is_deleted: is_deleted != 0,
            deleted_at: row.get("deleted_at")?,
            created_at: row.get("created_at")?,
            version: row.get("version")?,
        })
    })
    .optional()
    .map_err(Error::from)
}

fn read_typed_value(row: &rusqlite::Row, data_type: DataType) -> rusqlite::Result<Option<Value>> {
    Ok(match data_type {
        DataType::Text => row.get::<_, Option<String>>("value")?.map(Value::Text),
        DataType::Integer => row.get::<_, Option<i64>>("value")?.map(Value::Integer),
        DataType::Real => row.get::<_, Option<f64>>("value")?.map(Value::Real),
        DataType::Timestamp => row.get::<_, Option<String>>("value")?.map(Value::Timestamp),
    })
}

/// The full version history of a cell, ordered by version.
pub fn cell_history(
    conn: &Connection,
    row_id: &str,
    table_id: i64,
    column_id: i64,
    data_type: DataType,
) -> Result<Vec<CellVersion>> {
    let table = data_type.table_name();
    let sql = format!(
        "SELECT version, value, created_at, is_deleted, is_current FROM {table} \
         WHERE row_id = ?1 AND table_id = ?2 AND column_id = ?3 ORDER BY version"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![row_id, table_id, column_id], |row| {
            let is_deleted: i64 = row.get("is_deleted")?;
            let is_current: i64 = row.get("is_current")?;
            Ok(CellVersion {
                version: row.get("version")?,
                value: read_typed_value(row, data_type)?,
                created_at: row.get("created_at")?,
                is_deleted: is_deleted != 0,
                is_current: is_current != 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Soft-delete every cell of a row, across all live columns of its table.
/// Returns whether any cell was affected.
pub fn delete_row(conn: &Connection, table_id: i64, row_id: &str) -> Result<bool> {
    let columns = ColumnDefinition::list_live_for_table(conn, table_id)?;
    let mut any = false;
    for column in columns {
        if delete_value(conn, row_id, table_id, column.id, column.data_type)? {
            any = true;
        }
    }
    Ok(any)
}

/// Restore every tombstoned cell of a row to live, across all live
/// columns of its table. Returns whether any cell was restored.
pub fn undelete_row(conn: &Connection, table_id: i64, row_id: &str) -> Result<bool> {
    let columns = ColumnDefinition::list_live_for_table(conn, table_id)?;
    let mut any = false;
    for column in columns {
        if undelete_value(conn, row_id, table_id, column.id, column.data_type)? {
            any = true;
        }
    }
    Ok(any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sqlite::connect_in_memory;
    use crate::schema;

    fn setup() -> Connection {
        let conn = connect_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn
    }

    #[test]
    fn upsert_advances_version_and_keeps_history() {
        let conn = setup();
        let v0 = upsert_cell(&conn, "r1", 1, 1, DataType::Text, &Value::Text("draft".into()), false).unwrap();
        let v1 = upsert_cell(&conn, "r1", 1, 1, DataType::Text, &Value::Text("published".into()), false).unwrap();
        let v2 = upsert_cell(&conn, "r1", 1, 1, DataType::Text, &Value::Text("archived".into()), false).unwrap();
        assert_eq!((v0, v1, v2), (0, 1, 2));

        let current = read_current(&conn, "r1", 1, 1, DataType::Text, false).unwrap().unwrap();
        assert_eq!(current.value, Some(Value::Text("archived".into())));
        assert_eq!(current.version, 2);

        let history = cell_history(&conn, "r1", 1, 1, DataType::Text).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0..2].iter().all(|h| !h.is_current));
        assert!(history[2].is_current);
    }

    #[test]
    fn only_one_current_row_per_cell() {
        let conn = setup();
        upsert_cell(&conn, "r1", 1, 1, DataType::Integer, &Value::Integer(1), false).unwrap();
        upsert_cell(&conn, "r1", 1, 1, DataType::Integer, &Value::Integer(2), false).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM integer_values WHERE row_id='r1' AND table_id=1 AND column_id=1 AND is_current=1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn soft_delete_leaves_tombstone_current_without_new_version() {
        let conn = setup();
        upsert_cell(&conn, "r1", 1, 1, DataType::Text, &Value::Text("x".into()), false).unwrap();
        assert!(delete_value(&conn, "r1", 1, 1, DataType::Text).unwrap());

        assert!(read_current(&conn, "r1", 1, 1, DataType::Text, false).unwrap().is_none());
        let including_deleted = read_current(&conn, "r1", 1, 1, DataType::Text, true).unwrap().unwrap();
        assert!(including_deleted.is_deleted);
        assert_eq!(including_deleted.version, 0);

        let history = cell_history(&conn, "r1", 1, 1, DataType::Text).unwrap();
        assert_eq!(history.len(), 1, "soft delete must not create a new version");
    }

    #[test]
    fn upsert_after_tombstone_supersedes_it() {
        let conn = setup();
        upsert_cell(&conn, "r1", 1, 1, DataType::Text, &Value::Text("x".into()), false).unwrap();
        delete_value(&conn, "r1", 1, 1, DataType::Text).unwrap();
        let v = upsert_cell(&conn, "r1", 1, 1, DataType::Text, &Value::Text("y".into()), false).unwrap();
        assert_eq!(v, 1);

        let current = read_current(&conn, "r1", 1, 1, DataType::Text, false).unwrap().unwrap();
        assert!(!current.is_deleted);
        assert_eq!(current.value, Some(Value::Text("y".into())));
    }

    #[test]
    fn integer_coercion_rejects_fractional_values() {
        let err = coerce(DataType::Integer, &Value::Real(1.5), false).unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { .. }));
    }

    #[test]
    fn integer_coercion_parses_numeric_strings() {
        let coerced = coerce(DataType::Integer, &Value::Text("42".into()), false).unwrap();
        assert_eq!(coerced, Value::Integer(42));
    }

    #[test]
    fn timestamp_coercion_normalizes_to_millisecond_precision() {
        let coerced = coerce(
            DataType::Timestamp,
            &Value::Text("2023-12-25 10:00:00".into()),
            false,
        )
        .unwrap();
        assert_eq!(coerced, Value::Timestamp("2023-12-25 10:00:00.000".into()));
    }

    #[test]
    fn force_type_allows_numeric_to_text_only() {
        let coerced = coerce(DataType::Text, &Value::Integer(42), true).unwrap();
        assert_eq!(coerced, Value::Text("42".into()));

        let err = coerce(DataType::Integer, &Value::Real(1.5), true).unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { .. }));
    }
}
