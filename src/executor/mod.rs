//! Execution collaborator interface.
//!
//! The pipeline only ever sees error text from an executor; it classifies
//! that text itself and never relies on a structured error type.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use sqlite::SqliteExecutor;

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The engine rejected or failed the query. The message is the engine's
    /// own error text.
    #[error("{0}")]
    Query(String),

    #[error("Database unavailable: {0}")]
    Connection(String),
}

/// Result set of one executed query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Set when the engine produced more rows than the executor keeps
    pub truncated: bool,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            truncated: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Single-cell result (COUNT, SUM, ...)
    pub fn scalar(&self) -> Option<&Value> {
        match (self.columns.len(), self.rows.as_slice()) {
            (1, [row]) => row.first(),
            _ => None,
        }
    }

    /// Markdown-style preview of the first `max_rows` rows.
    pub fn preview(&self, max_rows: usize) -> String {
        if self.rows.is_empty() {
            return "No rows returned (empty result set)".to_string();
        }
        let mut lines = Vec::with_capacity(max_rows + 3);
        lines.push(format!("| {} |", self.columns.join(" | ")));
        lines.push(format!("|{}|", vec!["---"; self.columns.len()].join("|")));
        for row in self.rows.iter().take(max_rows) {
            let cells: Vec<String> = row.iter().map(display_value).collect();
            lines.push(format!("| {} |", cells.join(" | ")));
        }
        if self.rows.len() > max_rows {
            lines.push(format!("... and {} more rows", self.rows.len() - max_rows));
        }
        lines.join("\n")
    }
}

/// Render a cell for humans: strings unquoted, NULL spelled out, floats
/// with two decimals.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map(|f| format!("{:.2}", f))
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Runs validated, read-only query text.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str) -> Result<QueryRows, ExecutionError>;

    /// Short description for logging
    fn description(&self) -> String;
}
