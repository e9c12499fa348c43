// src/connection.rs

//! The public core surface: a single owned `Connection` wrapping one
//! `rusqlite::Connection`, assembling the schema installer, metadata
//! store, versioned cell store, and view materializer behind the
//! operations callers actually use. It's the one object application code
//! holds — no global/default connection anywhere in this crate.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde_json::{Map, Value as JsonValue};

use crate::backend::sqlite;
use crate::cell_store;
use crate::error::{Error, Result};
use crate::id;
use crate::metadata::{self, model::ColumnDefinition, model::DataType, model::TableDefinition, ColumnSpec};
use crate::schema;
use crate::txn;
use crate::value::Value;
use crate::view;

/// An owned handle to one SynthDB database file (or in-memory instance).
pub struct Connection {
    conn: rusqlite::Connection,
}

impl Connection {
    /// Open (creating the file if necessary) a database at `location`.
    /// Does not install the schema — call `init_db` on a fresh file.
    pub fn open(location: &Path) -> Result<Self> {
        Ok(Self {
            conn: sqlite::connect(location)?,
        })
    }

    /// Open an ephemeral in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: sqlite::connect_in_memory()?,
        })
    }

    /// Install the fixed schema. Safe to call on an already-initialized
    /// database.
    pub fn init_db(&mut self) -> Result<()> {
        schema::install(&self.conn)
    }

    /// Rematerialize every live table's view. Useful after opening a
    /// database file whose views may predate a schema change elsewhere.
    pub fn refresh_views(&mut self) -> Result<()> {
        view::materialize_all(&self.conn)
    }

    // -- Metadata Store surface --------------------------------

    pub fn create_table(&mut self, name: &str) -> Result<i64> {
        txn::with_transaction(&mut self.conn, |txn| metadata::create_table(txn, name))
    }

    pub fn delete_table(&mut self, name: &str, hard: bool) -> Result<()> {
        txn::with_transaction(&mut self.conn, |txn| metadata::delete_table(txn, name, hard))
    }

    pub fn add_column(&mut self, table: &str, name: &str, data_type: DataType) -> Result<i64> {
        txn::with_transaction(&mut self.conn, |txn| {
            metadata::add_column(txn, table, name, data_type)
        })
    }

    pub fn add_columns(
        &mut self,
        table: &str,
        columns: Vec<(String, ColumnSpec)>,
    ) -> Result<HashMap<String, i64>> {
        txn::with_transaction(&mut self.conn, |txn| metadata::add_columns(txn, table, columns))
    }

    pub fn rename_column(&mut self, table: &str, old: &str, new: &str) -> Result<()> {
        txn::with_transaction(&mut self.conn, |txn| metadata::rename_column(txn, table, old, new))
    }

    pub fn delete_column(&mut self, table: &str, name: &str, hard: bool) -> Result<()> {
        txn::with_transaction(&mut self.conn, |txn| {
            metadata::delete_column(txn, table, name, hard)
        })
    }

    pub fn copy_table(&mut self, src: &str, dst: &str, copy_data: bool) -> Result<i64> {
        txn::with_transaction(&mut self.conn, |txn| metadata::copy_table(txn, src, dst, copy_data))
    }

    pub fn list_tables(&self) -> Result<Vec<TableDefinition>> {
        metadata::list_tables(&self.conn)
    }

    pub fn list_columns(&self, table: &str, include_deleted: bool) -> Result<Vec<ColumnDefinition>> {
        metadata::list_columns(&self.conn, table, include_deleted)
    }

    // -- Versioned Cell Store surface (row-level only) --

    /// Insert a new row. `row_id` lets the caller supply an explicit id;
    /// if it already names a live or tombstoned row in `table`, this acts
    /// as an update of that row's cells rather than an error.
    pub fn insert(
        &mut self,
        table: &str,
        values: &[(&str, Value)],
        row_id: Option<String>,
        force_type: bool,
    ) -> Result<String> {
        let row_id = row_id.unwrap_or_else(id::new_row_id);
        txn::with_transaction(&mut self.conn, |txn| {
            write_row(txn, table, &row_id, values, force_type)
        })?;
        Ok(row_id)
    }

    /// Update an existing row's cells (or create it at `row_id` if absent).
    pub fn upsert(&mut self, table: &str, values: &[(&str, Value)], row_id: &str, force_type: bool) -> Result<String> {
        txn::with_transaction(&mut self.conn, |txn| {
            write_row(txn, table, row_id, values, force_type)
        })?;
        Ok(row_id.to_string())
    }

    pub fn delete_row(&mut self, table: &str, row_id: &str) -> Result<bool> {
        txn::with_transaction(&mut self.conn, |txn| {
            let table_def = require_live_table(txn, table)?;
            cell_store::delete_row(txn, table_def.id, row_id)
        })
    }

    pub fn undelete_row(&mut self, table: &str, row_id: &str) -> Result<bool> {
        txn::with_transaction(&mut self.conn, |txn| {
            let table_def = require_live_table(txn, table)?;
            cell_store::undelete_row(txn, table_def.id, row_id)
        })
    }

    // -- Query surface -------------------------------------------------

    /// Select over a logical table's view. `where_clause`, if given, is
    /// spliced verbatim after `WHERE` — the core performs no validation of
    /// it; a separate policy layer is responsible for that.
    pub fn query(&self, table: &str, where_clause: Option<&str>) -> Result<Vec<Map<String, JsonValue>>> {
        let sql = match where_clause {
            Some(clause) => format!("SELECT * FROM \"{table}\" WHERE {clause}"),
            None => format!("SELECT * FROM \"{table}\""),
        };
        self.execute_sql(&sql, &[])
    }

    /// Pass a statement straight through to the engine, returning rows as
    /// name-keyed mappings. No validation; callers are trusted.
    pub fn execute_sql(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Map<String, JsonValue>>> {
        let mut stmt = self.conn.prepare(sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let rows = stmt
            .query_map(params, |row| row_to_json_map(row, &column_names))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn require_live_table(conn: &rusqlite::Connection, name: &str) -> Result<TableDefinition> {
    TableDefinition::find_live_by_name(conn, name)?.ok_or_else(|| Error::TableNotFound(name.to_string()))
}

fn write_row(
    conn: &rusqlite::Connection,
    table: &str,
    row_id: &str,
    values: &[(&str, Value)],
    force_type: bool,
) -> Result<()> {
    let table_def = require_live_table(conn, table)?;
    for (column_name, value) in values {
        let column = ColumnDefinition::find_live_by_name(conn, table_def.id, column_name)?.ok_or_else(|| {
            Error::ColumnNotFound {
                table: table.to_string(),
                column: column_name.to_string(),
            }
        })?;
        cell_store::upsert_cell(conn, row_id, table_def.id, column.id, column.data_type, value, force_type)?;
    }
    Ok(())
}

fn row_to_json_map(row: &Row, column_names: &[String]) -> rusqlite::Result<Map<String, JsonValue>> {
    let mut map = Map::with_capacity(column_names.len());
    for (i, name) in column_names.iter().enumerate() {
        let value = match row.get_ref(i)? {
            ValueRef::Null => JsonValue::Null,
            ValueRef::Integer(n) => JsonValue::from(n),
            ValueRef::Real(f) => JsonValue::from(f),
            ValueRef::Text(t) => JsonValue::from(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => JsonValue::from(b.to_vec()),
        };
        map.insert(name.clone(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.init_db().unwrap();
        conn
    }

    #[test]
    fn end_to_end_insert_and_query() {
        let mut conn = open();
        conn.create_table("users").unwrap();
        conn.add_column("users", "name", DataType::Text).unwrap();
        conn.add_column("users", "age", DataType::Integer).unwrap();

        let row_id = conn
            .insert(
                "users",
                &[("name", Value::Text("Alice".into())), ("age", Value::Integer(30))],
                None,
                false,
            )
            .unwrap();

        let rows = conn.query("users", None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["row_id"], JsonValue::from(row_id));
        assert_eq!(rows[0]["name"], JsonValue::from("Alice"));
        assert_eq!(rows[0]["age"], JsonValue::from(30));
        assert!(rows[0]["created_at"].is_string());
    }

    #[test]
    fn explicit_row_id_collision_updates_instead_of_erroring() {
        let mut conn = open();
        conn.create_table("t").unwrap();
        conn.add_column("t", "status", DataType::Text).unwrap();

        conn.insert("t", &[("status", Value::Text("draft".into()))], Some("r1".into()), false)
            .unwrap();
        conn.insert("t", &[("status", Value::Text("final".into()))], Some("r1".into()), false)
            .unwrap();

        let rows = conn.query("t", None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["status"], JsonValue::from("final"));
    }

    #[test]
    fn delete_row_then_undelete_restores_the_same_projection() {
        let mut conn = open();
        conn.create_table("t").unwrap();
        conn.add_column("t", "name", DataType::Text).unwrap();
        let row_id = conn.insert("t", &[("name", Value::Text("X".into()))], None, false).unwrap();

        assert!(conn.delete_row("t", &row_id).unwrap());
        assert!(conn.query("t", None).unwrap().is_empty());

        assert!(conn.undelete_row("t", &row_id).unwrap());
        let rows = conn.query("t", None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], JsonValue::from("X"));
    }

    #[test]
    fn insert_rejects_unknown_columns() {
        let mut conn = open();
        conn.create_table("t").unwrap();
        let err = conn.insert("t", &[("ghost", Value::Text("x".into()))], None, false).unwrap_err();
        assert!(matches!(err, Error::ColumnNotFound { .. }));
    }
}
