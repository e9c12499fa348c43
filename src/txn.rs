// src/txn.rs

//! Transaction Coordinator.
//!
//! A scoped acquisition of a `rusqlite::Transaction` that commits on
//! normal exit and rolls back on any error path. `rusqlite::Transaction`
//! already rolls back on `Drop` if never committed, so the coordinator is
//! a thin call-site convention (`with_transaction`) rather than a guard
//! type of its own.

use rusqlite::Connection;

use crate::error::Result;

/// Run `body` inside a single transaction. On `Ok`, the transaction is
/// committed and the value returned; on `Err`, the transaction is dropped
/// (rolling back) and the error propagated. This is the sole path by which
/// multi-statement mutations (cell upserts, metadata changes, bulk loads,
/// `copy_table`) reach the database, satisfying an all-or-nothing
/// guarantee.
pub fn with_transaction<T>(
    conn: &mut Connection,
    body: impl FnOnce(&rusqlite::Transaction) -> Result<T>,
) -> Result<T> {
    let txn = conn.transaction()?;
    let result = body(&txn)?;
    txn.commit()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sqlite::connect_in_memory;

    #[test]
    fn commits_on_success() {
        let mut conn = connect_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();

        with_transaction(&mut conn, |txn| {
            txn.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Ok(())
        })
        .unwrap();

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn rolls_back_on_error() {
        let mut conn = connect_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();

        let result = with_transaction(&mut conn, |txn| {
            txn.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Err(crate::error::Error::InvariantViolation("boom".into()))
        });
        assert!(result.is_err());

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
