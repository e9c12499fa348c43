// src/merge.rs

//! Structural Merger.
//!
//! Diffs two branches' live metadata and additively copies what the
//! target is missing — new tables wholesale, new columns one at a time.
//! Columns present in both branches under different types are reported
//! as conflicts and never touched. Branch/file bookkeeping lives in
//! `branch.rs`; this module only ever sees two already-open
//! `Connection`s.

use std::collections::HashMap;

use crate::connection::Connection;
use crate::error::Result;
use crate::metadata::model::DataType;
use crate::metadata::ColumnSpec;

/// A column present in both branches with irreconcilable types.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeConflict {
    pub table: String,
    pub column: String,
    pub source_type: DataType,
    pub target_type: DataType,
}

/// The result of diffing (and, unless `dry_run`, applying) a structural
/// merge between two branches.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub new_tables: Vec<String>,
    pub new_columns: HashMap<String, Vec<String>>,
    pub type_conflicts: Vec<TypeConflict>,
    pub dry_run: bool,
}

/// Diff `source` against `target` and, unless `dry_run`, apply the
/// additive changes to `target`. Never overwrites an existing column's
/// type; conflicting columns are reported, not merged.
pub fn merge(source: &Connection, target: &mut Connection, dry_run: bool) -> Result<MergeReport> {
    let mut report = MergeReport {
        dry_run,
        ..Default::default()
    };

    let source_tables = source.list_tables()?;
    let target_table_names: std::collections::HashSet<String> =
        target.list_tables()?.into_iter().map(|t| t.name).collect();

    for table in &source_tables {
        let source_columns = source.list_columns(&table.name, false)?;

        if !target_table_names.contains(&table.name) {
            report.new_tables.push(table.name.clone());
            if !dry_run {
                target.create_table(&table.name)?;
                let columns = source_columns
                    .iter()
                    .map(|c| (c.name.clone(), ColumnSpec::Type(c.data_type)))
                    .collect();
                if !source_columns.is_empty() {
                    target.add_columns(&table.name, columns)?;
                }
            }
            continue;
        }

        let target_columns = target.list_columns(&table.name, false)?;
        let target_by_name: HashMap<&str, DataType> =
            target_columns.iter().map(|c| (c.name.as_str(), c.data_type)).collect();

        let mut fresh_columns = Vec::new();
        for column in &source_columns {
            match target_by_name.get(column.name.as_str()) {
                None => fresh_columns.push(column),
                Some(target_type) if *target_type != column.data_type => {
                    report.type_conflicts.push(TypeConflict {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        source_type: column.data_type,
                        target_type: *target_type,
                    });
                }
                Some(_) => {}
            }
        }

        if !fresh_columns.is_empty() {
            report
                .new_columns
                .entry(table.name.clone())
                .or_default()
                .extend(fresh_columns.iter().map(|c| c.name.clone()));

            if !dry_run {
                for column in fresh_columns {
                    target.add_column(&table.name, &column.name, column.data_type)?;
                }
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::DataType;

    fn open() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.init_db().unwrap();
        conn
    }

    #[test]
    fn dry_run_reports_without_mutating_target() {
        let mut source = open();
        source.create_table("users").unwrap();
        source.add_column("users", "created_at", DataType::Timestamp).unwrap();
        source.add_column("users", "last_active", DataType::Text).unwrap();
        source.create_table("analytics_events").unwrap();

        let mut target = open();
        target.create_table("users").unwrap();
        target.add_column("users", "created_at", DataType::Text).unwrap();

        let report = merge(&source, &mut target, true).unwrap();

        assert_eq!(report.new_tables, vec!["analytics_events".to_string()]);
        assert_eq!(report.new_columns["users"], vec!["last_active".to_string()]);
        assert_eq!(report.type_conflicts.len(), 1);
        assert_eq!(report.type_conflicts[0].column, "created_at");
        assert_eq!(report.type_conflicts[0].source_type, DataType::Timestamp);
        assert_eq!(report.type_conflicts[0].target_type, DataType::Text);

        assert!(target.list_tables().unwrap().iter().all(|t| t.name != "analytics_events"));
    }

    #[test]
    fn applied_merge_is_additive_and_preserves_conflicting_column_type() {
        let mut source = open();
        source.create_table("users").unwrap();
        source.add_column("users", "created_at", DataType::Timestamp).unwrap();
        source.add_column("users", "last_active", DataType::Text).unwrap();
        source.create_table("analytics_events").unwrap();
        source.add_column("analytics_events", "kind", DataType::Text).unwrap();

        let mut target = open();
        target.create_table("users").unwrap();
        target.add_column("users", "created_at", DataType::Text).unwrap();

        merge(&source, &mut target, false).unwrap();

        let tables: Vec<String> = target.list_tables().unwrap().into_iter().map(|t| t.name).collect();
        assert!(tables.contains(&"analytics_events".to_string()));

        let users_columns = target.list_columns("users", false).unwrap();
        let created_at = users_columns.iter().find(|c| c.name == "created_at").unwrap();
        assert_eq!(created_at.data_type, DataType::Text, "conflicting column must be left untouched");
        assert!(users_columns.iter().any(|c| c.name == "last_active"));
    }

    #[test]
    fn reapplying_a_merge_is_a_no_op() {
        let mut source = open();
        source.create_table("t").unwrap();
        source.add_column("t", "a", DataType::Text).unwrap();

        let mut target = open();

        merge(&source, &mut target, false).unwrap();
        let second = merge(&source, &mut target, false).unwrap();

        assert!(second.new_tables.is_empty());
        assert!(second.new_columns.is_empty());
        assert!(second.type_conflicts.is_empty());
    }
}
