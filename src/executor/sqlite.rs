//! Read-only SQLite adapter: query execution and schema extraction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, OpenFlags};
use serde_json::Value;

use super::{ExecutionError, QueryExecutor, QueryRows};
use crate::schema::{ForeignKey, SchemaView, TableInfo};

/// Rows kept from a single result set unless configured otherwise.
pub const DEFAULT_MAX_ROWS: usize = 1000;

pub struct SqliteExecutor {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    interrupt: InterruptHandle,
    max_rows: usize,
}

/// Stops the in-flight statement when an `execute` future is dropped before
/// it finishes, so the connection is free for the next attempt.
struct CancelOnDrop<'a> {
    interrupt: &'a InterruptHandle,
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::SeqCst);
            self.interrupt.interrupt();
            tracing::debug!("Interrupted abandoned query");
        }
    }
}

impl SqliteExecutor {
    /// Open `path` read-only. The file must already exist.
    pub fn open(path: &Path, max_rows: usize) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database {}", path.display()))?;

        tracing::info!(path = %path.display(), max_rows, "Opened database read-only");

        Ok(Self {
            path: path.to_path_buf(),
            interrupt: conn.get_interrupt_handle(),
            conn: Arc::new(Mutex::new(conn)),
            max_rows: max_rows.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a [`SchemaView`] from the database catalog.
    pub fn load_schema(&self) -> Result<SchemaView> {
        let conn = self.conn.lock();
        load_schema(&conn)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn load_schema(conn: &Connection) -> Result<SchemaView> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .context("Failed to list tables")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut tables = BTreeMap::new();
    for name in names {
        let quoted = quote_ident(&name);
        let mut info = TableInfo::default();

        let mut cols = conn.prepare(&format!("PRAGMA table_info({})", quoted))?;
        let mut rows = cols.query([])?;
        // (position in primary key, column): pk ordinal is 1-based, 0 means not a key
        let mut pk: Vec<(i64, String)> = Vec::new();
        while let Some(row) = rows.next()? {
            let column: String = row.get(1)?;
            let ty: String = row.get(2)?;
            let pk_pos: i64 = row.get(5)?;
            if pk_pos > 0 {
                pk.push((pk_pos, column.clone()));
            }
            info.column_types.insert(column.clone(), ty);
            info.columns.push(column);
        }
        pk.sort();
        info.primary_key = pk.into_iter().map(|(_, c)| c).collect();

        let mut fks = conn.prepare(&format!("PRAGMA foreign_key_list({})", quoted))?;
        let mut rows = fks.query([])?;
        while let Some(row) = rows.next()? {
            let target_table: String = row.get(2)?;
            let column: String = row.get(3)?;
            // A NULL target column means the target's primary key
            let target_column: Option<String> = row.get(4)?;
            info.foreign_keys.push(ForeignKey {
                column: column.clone(),
                target_table,
                target_column: target_column.unwrap_or(column),
            });
        }

        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quoted), [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows in {}", name))?;
        info.row_count = count.max(0) as u64;

        tables.insert(name, info);
    }

    tracing::debug!(tables = tables.len(), "Loaded schema from database");
    Ok(SchemaView::new(tables))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

/// Runs one statement; stops between rows once `cancelled` is set.
fn run_query(
    conn: &Connection,
    query: &str,
    max_rows: usize,
    cancelled: &AtomicBool,
) -> Result<QueryRows, ExecutionError> {
    let query_err = |e: rusqlite::Error| ExecutionError::Query(e.to_string());

    let mut stmt = conn.prepare(query).map_err(query_err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut result = QueryRows::new(columns, Vec::new());
    let mut rows = stmt.query([]).map_err(query_err)?;
    while let Some(row) = rows.next().map_err(query_err)? {
        if cancelled.load(Ordering::SeqCst) {
            return Err(ExecutionError::Query("interrupted".to_string()));
        }
        if result.rows.len() == max_rows {
            result.truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(to_json(row.get_ref(idx).map_err(query_err)?));
        }
        result.rows.push(values);
    }
    Ok(result)
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn execute(&self, query: &str) -> Result<QueryRows, ExecutionError> {
        let conn = Arc::clone(&self.conn);
        let query = query.to_string();
        let max_rows = self.max_rows;

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut guard = CancelOnDrop {
            interrupt: &self.interrupt,
            cancelled: Arc::clone(&cancelled),
            armed: true,
        };

        let task = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            // Abandoned while waiting for the connection
            if cancelled.load(Ordering::SeqCst) {
                return Err(ExecutionError::Query("interrupted".to_string()));
            }
            run_query(&conn, &query, max_rows, &cancelled)
        });
        let joined = task.await;
        guard.armed = false;

        let rows = joined.map_err(|e| ExecutionError::Connection(e.to_string()))??;

        if rows.truncated {
            tracing::warn!(max_rows, "Result set truncated");
        }
        Ok(rows)
    }

    fn description(&self) -> String {
        format!("SQLite (read-only) {}", self.path.display())
    }
}
