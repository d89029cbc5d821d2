use rusqlite::Connection;
use sqlpilot_common::{Error, Result};

use crate::executor::SqlExecutor;

const SAMPLES_PER_COLUMN: usize = 3;

/// Render the database schema as one line per table:
/// `Table <name>: <col> <TYPE> (e.g. v1, v2, v3), ...`.
///
/// Sample values give the completion model concrete literals to match
/// against; a column whose sampling fails is listed without annotation.
/// The output feeds the prompt assembler verbatim.
pub fn schema_text(executor: &SqlExecutor) -> Result<String> {
    let conn = executor.connection()?;

    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
        .map_err(|e| Error::Database(format!("failed to list tables: {e}")))?;
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::Database(format!("failed to read table names: {e}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Database(format!("failed to collect table names: {e}")))?;

    let mut lines = Vec::with_capacity(tables.len());
    for table in tables {
        if table.starts_with("sqlite_") {
            continue;
        }
        lines.push(describe_table(&conn, &table)?);
    }
    Ok(lines.join("\n"))
}

fn describe_table(conn: &Connection, table: &str) -> Result<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info(\"{table}\")"))
        .map_err(|e| Error::Database(format!("failed to inspect table {table}: {e}")))?;

    let columns: Vec<(String, String)> = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })
        .map_err(|e| Error::Database(format!("failed to read columns of {table}: {e}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Database(format!("failed to collect columns of {table}: {e}")))?;

    let mut col_defs = Vec::with_capacity(columns.len());
    for (name, col_type) in columns {
        let samples = sample_values(conn, table, &name);
        let def = if samples.is_empty() {
            format!("{name} {col_type}").trim_end().to_string()
        } else {
            format!("{name} {col_type} (e.g. {})", samples.join(", "))
        };
        col_defs.push(def);
    }

    Ok(format!("Table {table}: {}", col_defs.join(", ")))
}

fn sample_values(conn: &Connection, table: &str, column: &str) -> Vec<String> {
    let sql = format!(
        "SELECT DISTINCT \"{column}\" FROM \"{table}\" WHERE \"{column}\" IS NOT NULL LIMIT {SAMPLES_PER_COLUMN}"
    );
    let Ok(mut stmt) = conn.prepare(&sql) else {
        return Vec::new();
    };
    let Ok(rows) = stmt.query_map([], |row| {
        row.get_ref(0).map(|v| match v {
            rusqlite::types::ValueRef::Null => String::new(),
            rusqlite::types::ValueRef::Integer(i) => i.to_string(),
            rusqlite::types::ValueRef::Real(f) => f.to_string(),
            rusqlite::types::ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
            rusqlite::types::ValueRef::Blob(_) => "<blob>".to_string(),
        })
    }) else {
        return Vec::new();
    };
    rows.flatten().filter(|s| !s.is_empty()).collect()
}
