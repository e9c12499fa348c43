// src/metadata/model.rs

//! Catalog row types: `table_definitions` and `column_definitions`.
//!
//! A plain struct per table plus `insert`/`find_by_*`/`list_all`/`from_row`
//! methods against a `rusqlite::Connection` (or, here, a
//! `rusqlite::Transaction`, since every catalog mutation runs inside a
//! coordinated transaction).

use std::str::FromStr;

use rusqlite::{OptionalExtension, Row};

use crate::error::{Error, Result};

/// The four logical data types this crate's storage surface supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Text,
    Integer,
    Real,
    Timestamp,
}

impl DataType {
    /// Name of the physical value-partition table for this type.
    pub fn table_name(self) -> &'static str {
        match self {
            DataType::Text => "text_values",
            DataType::Integer => "integer_values",
            DataType::Real => "real_values",
            DataType::Timestamp => "timestamp_values",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Integer => "integer",
            DataType::Real => "real",
            DataType::Timestamp => "timestamp",
        }
    }

    /// All types this crate's Schema Installer creates a partition for, in
    /// a stable order used for deterministic DDL emission.
    pub const ALL: [DataType; 4] = [
        DataType::Text,
        DataType::Integer,
        DataType::Real,
        DataType::Timestamp,
    ];
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(DataType::Text),
            "integer" => Ok(DataType::Integer),
            "real" => Ok(DataType::Real),
            "timestamp" => Ok(DataType::Timestamp),
            other => Err(Error::UnknownType(other.to_string())),
        }
    }
}

/// A row of `table_definitions`.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub id: i64,
    pub version: i64,
    pub created_at: String,
    pub deleted_at: Option<String>,
    pub name: String,
}

impl TableDefinition {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            deleted_at: row.get("deleted_at")?,
            name: row.get("name")?,
        })
    }

    /// Look up a live table by name.
    pub(crate) fn find_live_by_name(
        conn: &rusqlite::Connection,
        name: &str,
    ) -> Result<Option<Self>> {
        conn.query_row(
            "SELECT id, version, created_at, deleted_at, name FROM table_definitions \
             WHERE name = ?1 AND deleted_at IS NULL",
            [name],
            Self::from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    pub(crate) fn find_by_id(conn: &rusqlite::Connection, id: i64) -> Result<Option<Self>> {
        conn.query_row(
            "SELECT id, version, created_at, deleted_at, name FROM table_definitions \
             WHERE id = ?1",
            [id],
            Self::from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    pub(crate) fn list_live(conn: &rusqlite::Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, version, created_at, deleted_at, name FROM table_definitions \
             WHERE deleted_at IS NULL ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

/// A row of `column_definitions`.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub id: i64,
    pub table_id: i64,
    pub version: i64,
    pub created_at: String,
    pub deleted_at: Option<String>,
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDefinition {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let data_type_str: String = row.get("data_type")?;
        let data_type = data_type_str.parse::<DataType>().map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                0,
                "data_type".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;
        Ok(Self {
            id: row.get("id")?,
            table_id: row.get("table_id")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            deleted_at: row.get("deleted_at")?,
            name: row.get("name")?,
            data_type,
        })
    }

    /// Live columns of `table_id`, ordered by id — the order the view
    /// materializer projects columns in.
    pub(crate) fn list_live_for_table(
        conn: &rusqlite::Connection,
        table_id: i64,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, table_id, version, created_at, deleted_at, name, data_type \
             FROM column_definitions WHERE table_id = ?1 AND deleted_at IS NULL ORDER BY id",
        )?;
        let rows = stmt
            .query_map([table_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All columns (live and soft-deleted) of `table_id`, ordered by id.
    pub(crate) fn list_all_for_table(
        conn: &rusqlite::Connection,
        table_id: i64,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, table_id, version, created_at, deleted_at, name, data_type \
             FROM column_definitions WHERE table_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([table_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub(crate) fn find_live_by_name(
        conn: &rusqlite::Connection,
        table_id: i64,
        name: &str,
    ) -> Result<Option<Self>> {
        conn.query_row(
            "SELECT id, table_id, version, created_at, deleted_at, name, data_type \
             FROM column_definitions WHERE table_id = ?1 AND name = ?2 AND deleted_at IS NULL",
            rusqlite::params![table_id, name],
            Self::from_row,
        )
        .optional()
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_round_trips_through_str() {
        for dt in DataType::ALL {
            let parsed: DataType = dt.as_str().parse().unwrap();
            assert_eq!(parsed, dt);
        }
    }

    #[test]
    fn unknown_type_name_is_rejected() {
        assert!("boolean".parse::<DataType>().is_err());
        assert!("json".parse::<DataType>().is_err());
        assert!("nonsense".parse::<DataType>().is_err());
    }
}
