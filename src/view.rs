// src/view.rs

//! View Materializer.
//!
//! Builds, for each live table, a `DROP VIEW IF EXISTS` + `CREATE VIEW`
//! pair: a union of per-column `SELECT DISTINCT row_id`, a LEFT JOIN per
//! column keyed on (row_id, table_id, column_id, is_current, is_deleted),
//! and `MIN`/`MAX` over each join's `created_at` for the view's own
//! `created_at`/`updated_at`.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::metadata::model::{ColumnDefinition, TableDefinition};

/// Drop and recreate the SQL view for a single live logical table. Safe to
/// call repeatedly; a pure function of the table's current live metadata.
pub fn materialize(conn: &Connection, table_id: i64) -> Result<()> {
    let table = TableDefinition::find_by_id(conn, table_id)?
        .ok_or_else(|| crate::error::Error::TableNotFound(format!("table_id {table_id}")))?;
    let columns = ColumnDefinition::list_live_for_table(conn, table_id)?;

    conn.execute(&format!("DROP VIEW IF EXISTS \"{}\"", table.name), [])?;

    if columns.is_empty() {
        debug!(table = %table.name, "materializing degenerate empty view");
        conn.execute(
            &format!(
                "CREATE VIEW \"{}\" AS \
                 SELECT NULL AS row_id, NULL AS created_at, NULL AS updated_at WHERE 1 = 0",
                table.name
            ),
            [],
        )?;
        return Ok(());
    }

    let sql = build_view_sql(&table.name, table_id, &columns);
    debug!(table = %table.name, column_count = columns.len(), "materializing view");
    conn.execute(&sql, [])?;
    Ok(())
}

/// Recreate views for every live logical table, e.g. after restoring a
/// database file into a fresh connection.
pub fn materialize_all(conn: &Connection) -> Result<()> {
    for table in TableDefinition::list_live(conn)? {
        materialize(conn, table.id)?;
    }
    Ok(())
}

fn build_view_sql(table_name: &str, table_id: i64, columns: &[ColumnDefinition]) -> String {
    let mut joins = Vec::with_capacity(columns.len());
    let mut projections = Vec::with_capacity(columns.len());
    let mut unions = Vec::with_capacity(columns.len());
    let mut timestamp_cols = Vec::with_capacity(columns.len());

    for column in columns {
        let type_table = column.data_type.table_name();
        let alias = format!("{type_table}_{}", column.id);

        joins.push(format!(
            "LEFT JOIN {type_table} {alias} ON \
             all_rows.row_id = {alias}.row_id AND \
             {alias}.table_id = {table_id} AND \
             {alias}.column_id = {col_id} AND \
             {alias}.is_current = 1 AND \
             {alias}.is_deleted = 0",
            col_id = column.id
        ));

        projections.push(format!("{alias}.value AS \"{}\"", column.name));

        unions.push(format!(
            "SELECT DISTINCT row_id FROM {type_table} \
             WHERE table_id = {table_id} AND is_current = 1 AND is_deleted = 0"
        ));

        timestamp_cols.push(format!("{alias}.created_at"));
    }

    format!(
        "CREATE VIEW \"{table_name}\" AS \
         SELECT all_rows.row_id, {projections}, \
         MIN({timestamps}) AS created_at, MAX({timestamps}) AS updated_at \
         FROM ({unions}) all_rows \
         {joins} \
         GROUP BY all_rows.row_id \
         HAVING COUNT(*) > 0",
        projections = projections.join(", "),
        timestamps = timestamp_cols.join(", "),
        unions = unions.join(" UNION "),
        joins = joins.join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sqlite::connect_in_memory;
    use crate::cell_store;
    use crate::metadata::model::DataType;
    use crate::schema;
    use crate::value::Value;

    fn setup() -> Connection {
        let conn = connect_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn
    }

    fn define_table(conn: &Connection, name: &str) -> i64 {
        conn.execute(
            "INSERT INTO table_definitions (id, name) \
             VALUES ((SELECT COALESCE(MAX(id), -1) + 1 FROM table_definitions), ?1)",
            [name],
        )
        .unwrap();
        conn.query_row(
            "SELECT id FROM table_definitions WHERE name = ?1",
            [name],
            |r| r.get(0),
        )
        .unwrap()
    }

    fn define_column(conn: &Connection, table_id: i64, name: &str, data_type: DataType) -> i64 {
        conn.execute(
            "INSERT INTO column_definitions (id, table_id, name, data_type) \
             VALUES ((SELECT COALESCE(MAX(id), -1) + 1 FROM column_definitions), ?1, ?2, ?3)",
            rusqlite::params![table_id, name, data_type.as_str()],
        )
        .unwrap();
        conn.query_row(
            "SELECT id FROM column_definitions WHERE table_id = ?1 AND name = ?2",
            rusqlite::params![table_id, name],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn empty_table_gets_degenerate_empty_view() {
        let conn = setup();
        let table_id = define_table(&conn, "empty_t");
        materialize(&conn, table_id).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM empty_t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn view_projects_current_non_deleted_cells_only() {
        let conn = setup();
        let table_id = define_table(&conn, "people");
        let name_col = define_column(&conn, table_id, "name", DataType::Text);
        let age_col = define_column(&conn, table_id, "age", DataType::Integer);
        materialize(&conn, table_id).unwrap();

        cell_store::upsert_cell(&conn, "r1", table_id, name_col, DataType::Text, &Value::Text("Alice".into()), false).unwrap();
        cell_store::upsert_cell(&conn, "r1", table_id, age_col, DataType::Integer, &Value::Integer(30), false).unwrap();
        cell_store::upsert_cell(&conn, "r2", table_id, name_col, DataType::Text, &Value::Text("Bob".into()), false).unwrap();

        let mut stmt = conn.prepare("SELECT row_id, name, age FROM people ORDER BY row_id").unwrap();
        let rows: Vec<(String, String, Option<i64>)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("r1".to_string(), "Alice".to_string(), Some(30)));
        assert_eq!(rows[1], ("r2".to_string(), "Bob".to_string(), None));
    }

    #[test]
    fn deleted_row_drops_out_of_view() {
        let conn = setup();
        let table_id = define_table(&conn, "t");
        let col = define_column(&conn, table_id, "v", DataType::Text);
        materialize(&conn, table_id).unwrap();

        cell_store::upsert_cell(&conn, "r1", table_id, col, DataType::Text, &Value::Text("x".into()), false).unwrap();
        cell_store::delete_row(&conn, table_id, "r1").unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
