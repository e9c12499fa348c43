// src/metadata/mod.rs

//! Metadata Store: the logical catalog of tables and columns, with
//! soft-delete semantics and name protection.

pub mod infer;
pub mod model;

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::debug;

use crate::cell_store;
use crate::error::{Error, Result};
use crate::id;
use crate::metadata::infer::infer_column_type;
use crate::metadata::model::{ColumnDefinition, DataType, TableDefinition};
use crate::name::validate_identifier;
use crate::value::Value;
use crate::view;

/// Either an explicit column type or a set of sample values to infer one
/// from — the two shapes `add_columns` accepts per.
pub enum ColumnSpec {
    Type(DataType),
    Samples(Vec<Option<Value>>),
}

fn require_live_table(conn: &Connection, name: &str) -> Result<TableDefinition> {
    TableDefinition::find_live_by_name(conn, name)?
        .ok_or_else(|| Error::TableNotFound(name.to_string()))
}

fn require_live_column(
    conn: &Connection,
    table_name: &str,
    table_id: i64,
    name: &str,
) -> Result<ColumnDefinition> {
    ColumnDefinition::find_live_by_name(conn, table_id, name)?.ok_or_else(|| Error::ColumnNotFound {
        table: table_name.to_string(),
        column: name.to_string(),
    })
}

fn next_table_id(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(id), -1) + 1 FROM table_definitions",
        [],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

fn next_column_id(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(id), -1) + 1 FROM column_definitions",
        [],
        |row| row.get(0),
    )
    .map_err(Error::from)
}

/// Create a new live logical table. Triggers a degenerate (zero-column)
/// view materialization.
pub fn create_table(conn: &Connection, name: &str) -> Result<i64> {
    validate_identifier(name)?;
    if TableDefinition::find_live_by_name(conn, name)?.is_some() {
        return Err(Error::NameTaken(name.to_string()));
    }

    let table_id = next_table_id(conn)?;
    conn.execute(
        "INSERT INTO table_definitions (id, name) VALUES (?1, ?2)",
        rusqlite::params![table_id, name],
    )?;

    debug!(table = name, table_id, "created table");
    view::materialize(conn, table_id)?;
    Ok(table_id)
}

/// Add a single column of an explicit type to a live table.
pub fn add_column(conn: &Connection, table: &str, name: &str, data_type: DataType) -> Result<i64> {
    validate_identifier(name)?;
    let table_def = require_live_table(conn, table)?;
    if ColumnDefinition::find_live_by_name(conn, table_def.id, name)?.is_some() {
        return Err(Error::NameTaken(name.to_string()));
    }

    let column_id = next_column_id(conn)?;
    conn.execute(
        "INSERT INTO column_definitions (id, table_id, name, data_type) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![column_id, table_def.id, name, data_type.as_str()],
    )?;

    debug!(table, column = name, column_id, data_type = data_type.as_str(), "added column");
    view::materialize(conn, table_def.id)?;
    Ok(column_id)
}

/// Add several columns at once, each either an explicit type or a sample
/// set to infer one from. Triggers a single view rematerialization
/// after all columns are added.
pub fn add_columns(
    conn: &Connection,
    table: &str,
    columns: Vec<(String, ColumnSpec)>,
) -> Result<HashMap<String, i64>> {
    let table_def = require_live_table(conn, table)?;
    let mut created = HashMap::with_capacity(columns.len());

    for (name, spec) in columns {
        validate_identifier(&name)?;
        if ColumnDefinition::find_live_by_name(conn, table_def.id, &name)?.is_some() {
            return Err(Error::NameTaken(name));
        }
        let data_type = match spec {
            ColumnSpec::Type(t) => t,
            ColumnSpec::Samples(samples) => infer_column_type(&samples),
        };

        let column_id = next_column_id(conn)?;
        conn.execute(
            "INSERT INTO column_definitions (id, table_id, name, data_type) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![column_id, table_def.id, name, data_type.as_str()],
        )?;
        created.insert(name, column_id);
    }

    view::materialize(conn, table_def.id)?;
    Ok(created)
}

/// Rename a live column in place. Retriggers the view so the old name
/// stops resolving and the new one takes over.
pub fn rename_column(conn: &Connection, table: &str, old: &str, new: &str) -> Result<()> {
    validate_identifier(new)?;
    let table_def = require_live_table(conn, table)?;
    let column = require_live_column(conn, table, table_def.id, old)?;

    if ColumnDefinition::find_live_by_name(conn, table_def.id, new)?.is_some() {
        return Err(Error::NameTaken(new.to_string()));
    }

    conn.execute(
        "UPDATE column_definitions SET name = ?1 WHERE id = ?2",
        rusqlite::params![new, column.id],
    )?;

    view::materialize(conn, table_def.id)
}

/// Soft- or hard-delete a column. Hard delete additionally purges every
/// physical value row for that column; the `column_definitions` row
/// itself is left in place with `deleted_at` set either way.
pub fn delete_column(conn: &Connection, table: &str, name: &str, hard: bool) -> Result<()> {
    let table_def = require_live_table(conn, table)?;
    let column = require_live_column(conn, table, table_def.id, name)?;

    conn.execute(
        "UPDATE column_definitions SET deleted_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = ?1",
        [column.id],
    )?;

    if hard {
        let value_table = column.data_type.table_name();
        conn.execute(
            &format!("DELETE FROM {value_table} WHERE column_id = ?1"),
            [column.id],
        )?;
    }

    view::materialize(conn, table_def.id)
}

/// Soft- or hard-delete a table. Hard delete additionally purges every
/// physical value row across all four value tables and every
/// `column_definitions` row for that table.
pub fn delete_table(conn: &Connection, table: &str, hard: bool) -> Result<()> {
    let table_def = require_live_table(conn, table)?;

    conn.execute(
        "UPDATE table_definitions SET deleted_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = ?1",
        [table_def.id],
    )?;

    if hard {
        for data_type in DataType::ALL {
            let value_table = data_type.table_name();
            conn.execute(
                &format!("DELETE FROM {value_table} WHERE table_id = ?1"),
                [table_def.id],
            )?;
        }
        conn.execute(
            "DELETE FROM column_definitions WHERE table_id = ?1",
            [table_def.id],
        )?;
    }

    // A deleted table no longer has a live view to drop via materialize;
    // remove it directly so stale rows can't be queried through it.
    conn.execute(&format!("DROP VIEW IF EXISTS \"{}\"", table_def.name), [])?;
    Ok(())
}

/// Copy a live table's column structure, and optionally its live cell
/// data with full history, into a freshly created table. Each
/// copied row gets a fresh row_id in `dst`; deleted source rows are not
/// copied.
pub fn copy_table(conn: &Connection, src: &str, dst: &str, copy_data: bool) -> Result<i64> {
    let src_def = require_live_table(conn, src)?;
    let dst_id = create_table(conn, dst)?;

    let src_columns = ColumnDefinition::list_live_for_table(conn, src_def.id)?;
    let mut column_map = HashMap::with_capacity(src_columns.len());
    for column in &src_columns {
        let new_id = add_column(conn, dst, &column.name, column.data_type)?;
        column_map.insert(column.id, new_id);
    }

    if copy_data {
        // Shared across every column so a source row's cells all land under
        // the same destination row_id — allocated lazily, the first time a
        // given source row_id is seen in any column.
        let mut row_id_map: HashMap<String, String> = HashMap::new();
        for column in &src_columns {
            let dst_column_id = column_map[&column.id];
            copy_column_data(
                conn,
                src_def.id,
                column.id,
                dst_id,
                dst_column_id,
                column.data_type,
                &mut row_id_map,
            )?;
        }
    }

    Ok(dst_id)
}

fn copy_column_data(
    conn: &Connection,
    src_table_id: i64,
    src_column_id: i64,
    dst_table_id: i64,
    dst_column_id: i64,
    data_type: DataType,
    row_id_map: &mut HashMap<String, String>,
) -> Result<()> {
    let table = data_type.table_name();
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT row_id FROM {table} \
         WHERE table_id = ?1 AND column_id = ?2 AND is_current = 1 AND is_deleted = 0"
    ))?;
    let live_row_ids = stmt
        .query_map(rusqlite::params![src_table_id, src_column_id], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for src_row_id in live_row_ids {
        let history = cell_store::cell_history(conn, &src_row_id, src_table_id, src_column_id, data_type)?;
        let new_row_id = row_id_map
            .entry(src_row_id)
            .or_insert_with(id::new_row_id)
            .clone();
        for entry in history {
            if let Some(value) = &entry.value {
                cell_store::upsert_cell(conn, &new_row_id, dst_table_id, dst_column_id, data_type, value, false)?;
            }
            if entry.is_deleted {
                cell_store::delete_value(conn, &new_row_id, dst_table_id, dst_column_id, data_type)?;
            }
        }
    }
    Ok(())
}

/// All live tables.
pub fn list_tables(conn: &Connection) -> Result<Vec<TableDefinition>> {
    TableDefinition::list_live(conn)
}

/// Columns of a table, live-only unless `include_deleted` is set.
pub fn list_columns(conn: &Connection, table: &str, include_deleted: bool) -> Result<Vec<ColumnDefinition>> {
    let table_def = require_live_table(conn, table)?;
    if include_deleted {
        ColumnDefinition::list_all_for_table(conn, table_def.id)
    } else {
        ColumnDefinition::list_live_for_table(conn, table_def.id)
    }
}
