use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use sqlpilot_common::{Error, Result};
use tracing::{debug, info};

use crate::gate::{ensure_limit, sanitize};

/// A single typed cell from a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Text(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::Real(r) => write!(f, "{r}"),
            SqlValue::Text(t) => write!(f, "{t}"),
        }
    }
}

/// Result of one gated execution. Produced per call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    pub row_count: usize,
}

/// Gated sqlite executor.
///
/// Every statement passes the safety gate and receives the configured row
/// cap before it reaches the engine. The connection sits behind a mutex that
/// is held only for the duration of one statement, never across awaits.
pub struct SqlExecutor {
    conn: Mutex<Connection>,
    max_rows: usize,
}

impl SqlExecutor {
    pub fn open(db_path: &Path, max_rows: usize) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_rows,
        })
    }

    pub fn in_memory(max_rows: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_rows,
        })
    }

    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Trusted setup path for schema creation and seeding. Question traffic
    /// never reaches this; it goes through the gated `execute`.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(sql)
            .map_err(|e| Error::Database(format!("batch execution failed: {e}")))
    }

    /// Gate and run one statement synchronously. Engine errors carry the
    /// attempted SQL and the engine's message text.
    pub fn execute_blocking(&self, sql: &str) -> Result<QueryResult> {
        let cleaned = sanitize(sql)?;
        let bounded = ensure_limit(&cleaned, self.max_rows);
        debug!("executing: {bounded}");

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&bounded).map_err(|e| Error::Execution {
            sql: bounded.clone(),
            message: e.to_string(),
        })?;

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut rows = Vec::new();
        let mut raw_rows = stmt.query([]).map_err(|e| Error::Execution {
            sql: bounded.clone(),
            message: e.to_string(),
        })?;
        loop {
            let row = match raw_rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    return Err(Error::Execution {
                        sql: bounded,
                        message: e.to_string(),
                    });
                }
            };
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value = row.get_ref(i).map_err(|e| Error::Execution {
                    sql: bounded.clone(),
                    message: e.to_string(),
                })?;
                cells.push(SqlValue::from_value_ref(value));
            }
            rows.push(cells);
            // Engine-side backstop: hold the row cap even when the statement
            // carried its own larger LIMIT.
            if rows.len() >= self.max_rows {
                break;
            }
        }

        let row_count = rows.len();
        Ok(QueryResult {
            columns,
            rows,
            row_count,
        })
    }

    /// Run one statement off the async runtime with a caller-imposed bound.
    /// Exceeding the bound surfaces `Error::Timeout`, distinct from an
    /// engine error. Takes an owned handle because the statement runs on a
    /// blocking thread that may outlive a timed-out caller.
    pub async fn execute(self: Arc<Self>, sql: &str, timeout: Duration) -> Result<QueryResult> {
        let executor = Arc::clone(&self);
        let sql = sql.to_string();
        let task = tokio::task::spawn_blocking(move || executor.execute_blocking(&sql));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Database(format!("execution task failed: {join_err}"))),
            Err(_) => Err(Error::Timeout(format!(
                "statement exceeded {}s execution bound",
                timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SqlExecutor, SqlValue};
    use sqlpilot_common::Error;
    use std::sync::Arc;
    use std::time::Duration;

    fn fixture() -> SqlExecutor {
        let executor = SqlExecutor::in_memory(200).expect("in-memory database should open");
        {
            let conn = executor.connection().expect("lock should not be poisoned");
            conn.execute_batch(
                "CREATE TABLE department (dept_name TEXT, budget REAL);
                 INSERT INTO department VALUES ('Physics', 120000.0);
                 INSERT INTO department VALUES ('History', 50000.0);
                 INSERT INTO department VALUES ('Biology', 300000.0);",
            )
            .expect("fixture schema should apply");
        }
        executor
    }

    #[test]
    fn execute_returns_typed_rows_and_columns() {
        let executor = fixture();
        let result = executor
            .execute_blocking("SELECT dept_name, budget FROM department ORDER BY dept_name")
            .expect("query should succeed");

        assert_eq!(result.columns, vec!["dept_name", "budget"]);
        assert_eq!(result.row_count, 3);
        assert_eq!(result.rows[0][0], SqlValue::Text("Biology".into()));
        assert_eq!(result.rows[0][1], SqlValue::Real(300000.0));
    }

    #[test]
    fn execute_rejects_non_select_before_reaching_the_engine() {
        let executor = fixture();
        let err = executor
            .execute_blocking("DELETE FROM department")
            .expect_err("writes must be rejected");
        assert!(matches!(err, Error::SafetyRejected(_)));
    }

    #[test]
    fn engine_error_carries_sql_and_message() {
        let executor = fixture();
        let err = executor
            .execute_blocking("SELECT no_such_column FROM department")
            .expect_err("bad column must fail");
        match err {
            Error::Execution { sql, message } => {
                assert!(sql.contains("no_such_column"));
                assert!(message.contains("no_such_column"));
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn row_cap_bounds_results_even_with_explicit_larger_limit() {
        let executor = SqlExecutor::in_memory(2).expect("in-memory database should open");
        {
            let conn = executor.connection().expect("lock should not be poisoned");
            conn.execute_batch(
                "CREATE TABLE t (x INTEGER);
                 INSERT INTO t VALUES (1), (2), (3), (4);",
            )
            .expect("fixture should apply");
        }

        let result = executor
            .execute_blocking("SELECT x FROM t LIMIT 100")
            .expect("query should succeed");
        assert_eq!(result.row_count, 2);
    }

    #[tokio::test]
    async fn async_execute_goes_through_the_gate() {
        let executor = Arc::new(fixture());
        let err = executor
            .execute("DROP TABLE department", Duration::from_secs(5))
            .await
            .expect_err("drop must be rejected");
        assert!(matches!(err, Error::SafetyRejected(_)));
    }

    #[tokio::test]
    async fn async_execute_returns_rows() {
        let executor = Arc::new(fixture());
        let result = executor
            .execute(
                "SELECT dept_name FROM department WHERE budget > 100000",
                Duration::from_secs(5),
            )
            .await
            .expect("query should succeed");
        assert_eq!(result.row_count, 2);
    }
}
