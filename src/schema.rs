// src/schema.rs

//! Schema installer.
//!
//! Idempotently creates the fixed internal schema: the logical catalog,
//! the four type-partitioned value tables, and their required indexes.
//! Every statement uses `IF NOT EXISTS` so repeated calls on an existing
//! database are safe — this is a fixed schema, not a version ladder, so
//! there is no migration sequence to apply.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metadata::model::DataType;

/// Install the full fixed schema. Safe to call on an already-initialized
/// database.
pub fn install(conn: &Connection) -> Result<()> {
    debug!("installing SynthDB schema");

    install_catalog_tables(conn)?;
    for data_type in DataType::ALL {
        install_value_table(conn, data_type)?;
    }
    install_indexes(conn)?;

    info!("schema install complete");
    Ok(())
}

fn install_catalog_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS table_definitions (
            id INTEGER PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            deleted_at TEXT,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS column_definitions (
            id INTEGER PRIMARY KEY,
            table_id INTEGER NOT NULL REFERENCES table_definitions(id),
            version INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            deleted_at TEXT,
            name TEXT NOT NULL,
            data_type TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS schema_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        INSERT OR IGNORE INTO schema_metadata (key, value) VALUES ('generation', '1');
        ",
    )?;
    Ok(())
}

fn install_value_table(conn: &Connection, data_type: DataType) -> Result<()> {
    let table = data_type.table_name();
    let sql_type = match data_type {
        DataType::Text => "TEXT",
        DataType::Integer => "INTEGER",
        DataType::Real => "REAL",
        DataType::Timestamp => "TEXT",
    };

    debug!(table, "creating value partition");
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                row_id TEXT NOT NULL,
                table_id INTEGER NOT NULL,
                column_id INTEGER NOT NULL,
                version INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                deleted_at TEXT,
                is_current INTEGER NOT NULL DEFAULT 1,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                value {sql_type}
            )"
        ),
        [],
    )?;
    Ok(())
}

fn install_indexes(conn: &Connection) -> Result<()> {
    for data_type in DataType::ALL {
        let table = data_type.table_name();
        let idx = format!("idx_{table}_current_cell");
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {idx} ON {table} (table_id, column_id, row_id) \
             WHERE deleted_at IS NULL"
        );
        if let Err(e) = conn.execute(&sql, []) {
            warn!(table, error = %e, "index creation failed, continuing");
        }
    }

    for sql in [
        "CREATE INDEX IF NOT EXISTS idx_table_definitions_name \
         ON table_definitions (name) WHERE deleted_at IS NULL",
        "CREATE INDEX IF NOT EXISTS idx_column_definitions_table_name \
         ON column_definitions (table_id, name) WHERE deleted_at IS NULL",
    ] {
        if let Err(e) = conn.execute(sql, []) {
            warn!(error = %e, "lookup index creation failed, continuing");
        }
    }

    Ok(())
}
