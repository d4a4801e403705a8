//! Schema-introspection questions answered directly from the [`SchemaView`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::patterns::{MetaKind, DESCRIBE_TABLE_PHRASINGS, META_PHRASINGS, META_STOPWORDS};
use crate::schema::SchemaView;

/// A recognized meta-query. `target` is the declared table name for
/// `DescribeTable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaQuery {
    pub kind: MetaKind,
    pub target: Option<String>,
}

/// Tabular payload of a meta answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl MetaTable {
    fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaAnswer {
    pub kind: MetaKind,
    pub summary: String,
    pub table: MetaTable,
}

/// Describe phrasing whose captured target resolves to a declared table.
fn describe_target<'s>(question: &str, schema: &'s SchemaView) -> Option<&'s str> {
    for pattern in DESCRIBE_TABLE_PHRASINGS.iter() {
        let Some(word) = pattern.captures(question).and_then(|c| c.get(1)) else {
            continue;
        };
        let word = word.as_str();
        if META_STOPWORDS.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        match schema.resolve_table(word) {
            Some(table) => return Some(table),
            None => {
                tracing::debug!(target = word, "Describe target not in schema");
            }
        }
    }
    None
}

/// Classify `question` as a meta-query.
///
/// A describe phrasing naming a real table wins over the target-free
/// phrasings; a target that does not resolve never yields `DescribeTable`.
pub fn detect_meta(question: &str, schema: &SchemaView) -> Option<MetaQuery> {
    let q = question.trim();
    if q.is_empty() {
        return None;
    }

    if let Some(table) = describe_target(q, schema) {
        tracing::debug!(table, "Describe-table meta-query detected");
        return Some(MetaQuery {
            kind: MetaKind::DescribeTable,
            target: Some(table.to_string()),
        });
    }

    let kind = META_PHRASINGS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(q)))
        .map(|(kind, _)| *kind)?;
    tracing::debug!(?kind, "Meta-query detected");
    Some(MetaQuery { kind, target: None })
}

/// Build the answer for a detected meta-query from the schema alone.
pub fn answer(query: &MetaQuery, schema: &SchemaView) -> MetaAnswer {
    let (summary, table) = match query.kind {
        MetaKind::ListTables => list_tables(schema),
        MetaKind::DescribeTable => describe_table(schema, query.target.as_deref()),
        MetaKind::TableRows => table_rows(schema),
        MetaKind::DescribeAll => describe_all(schema),
        MetaKind::Relationships => relationships(schema),
    };
    MetaAnswer {
        kind: query.kind,
        summary,
        table,
    }
}

fn list_tables(schema: &SchemaView) -> (String, MetaTable) {
    let mut table = MetaTable::new(&["Table Name", "Columns", "Row Count"]);
    for (name, info) in &schema.tables {
        table
            .rows
            .push(vec![json!(name), json!(info.columns.len()), json!(info.row_count)]);
    }
    let summary = format!(
        "The database contains {} tables with a total of {} rows: {}.",
        schema.tables.len(),
        schema.total_rows(),
        schema.table_names().collect::<Vec<_>>().join(", ")
    );
    (summary, table)
}

fn describe_table(schema: &SchemaView, target: Option<&str>) -> (String, MetaTable) {
    let mut table = MetaTable::new(&["Column", "Type", "Primary Key", "Foreign Key"]);
    let Some((name, info)) = target.and_then(|t| schema.tables.get_key_value(t)) else {
        return ("Please specify which table you want to describe.".to_string(), table);
    };

    for column in &info.columns {
        let ty = info
            .column_types
            .get(column)
            .map(String::as_str)
            .unwrap_or("UNKNOWN");
        let pk = if info.primary_key.contains(column) { "✓" } else { "" };
        let fk = info
            .foreign_keys
            .iter()
            .find(|fk| &fk.column == column)
            .map(|fk| format!("→ {}.{}", fk.target_table, fk.target_column))
            .unwrap_or_default();
        table
            .rows
            .push(vec![json!(column), json!(ty), json!(pk), json!(fk)]);
    }

    let summary = format!(
        "{} has {} columns and {} rows. Primary key: {}. {} foreign key(s).",
        name,
        info.columns.len(),
        info.row_count,
        if info.primary_key.is_empty() {
            "none".to_string()
        } else {
            info.primary_key.join(", ")
        },
        info.foreign_keys.len()
    );
    (summary, table)
}

fn table_rows(schema: &SchemaView) -> (String, MetaTable) {
    let mut table = MetaTable::new(&["Table", "Row Count"]);
    let mut by_rows: Vec<(&str, u64)> = schema
        .tables
        .iter()
        .map(|(name, info)| (name.as_str(), info.row_count))
        .collect();
    by_rows.sort_by(|a, b| b.1.cmp(&a.1));

    let Some(&(largest, count)) = by_rows.first() else {
        return ("No tables found in the database.".to_string(), table);
    };
    for (name, rows) in by_rows.iter().take(10) {
        table.rows.push(vec![json!(name), json!(rows)]);
    }
    (
        format!("The largest table is {} with {} rows.", largest, count),
        table,
    )
}

fn describe_all(schema: &SchemaView) -> (String, MetaTable) {
    let mut table = MetaTable::new(&["Table", "Columns", "Rows", "Foreign Keys"]);
    for (name, info) in &schema.tables {
        table.rows.push(vec![
            json!(name),
            json!(info.columns.len()),
            json!(info.row_count),
            json!(info.foreign_keys.len()),
        ]);
    }
    let summary = format!(
        "Database has {} tables, {} columns and {} total rows.",
        schema.tables.len(),
        schema.total_columns(),
        schema.total_rows()
    );
    (summary, table)
}

fn relationships(schema: &SchemaView) -> (String, MetaTable) {
    let mut table = MetaTable::new(&["From Table", "Column", "To Table", "To Column"]);
    for (owner, fk) in schema.foreign_key_edges() {
        table.rows.push(vec![
            json!(owner),
            json!(fk.column),
            json!(fk.target_table),
            json!(fk.target_column),
        ]);
    }
    let summary = if table.rows.is_empty() {
        "No foreign key relationships found in the database.".to_string()
    } else {
        format!("Found {} foreign key relationships in the database.", table.rows.len())
    };
    (summary, table)
}
