//! Read-only structural metadata for the target dataset.
//!
//! A `SchemaView` is handed to the pipeline once per session, either loaded
//! from a JSON file or built by an adapter such as
//! [`SqliteExecutor::load_schema`](crate::executor::sqlite::SqliteExecutor::load_schema).
//! The pipeline never mutates it; [`refiner`] derives narrowed copies.

pub mod fk_graph;
pub mod refiner;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NlsqlError, Result};

pub use fk_graph::FkGraph;
pub use refiner::{refine_schema, RefineConfig};

/// A declared foreign key: `column` in the owning table references
/// `target_table.target_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub target_table: String,
    pub target_column: String,
}

/// Metadata for a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableInfo {
    /// Column names in declaration order
    pub columns: Vec<String>,

    /// Declared type per column (e.g. "INTEGER", "NVARCHAR(120)")
    pub column_types: BTreeMap<String, String>,

    /// Primary key columns
    pub primary_key: Vec<String>,

    /// Outgoing foreign keys
    pub foreign_keys: Vec<ForeignKey>,

    /// Number of rows at extraction time
    pub row_count: u64,
}

impl TableInfo {
    /// Case-insensitive column lookup, returning the declared spelling.
    pub fn find_column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }
}

/// Read-only view of every table in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaView {
    pub tables: BTreeMap<String, TableInfo>,
}

impl SchemaView {
    pub fn new(tables: BTreeMap<String, TableInfo>) -> Self {
        Self { tables }
    }

    /// Load a pre-computed view from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let view: SchemaView = serde_json::from_str(&contents)?;
        if view.tables.is_empty() {
            return Err(NlsqlError::Schema(format!(
                "Schema file {} contains no tables",
                path.display()
            )));
        }
        Ok(view)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    /// Case-insensitive exact table lookup, returning the declared name.
    pub fn find_table(&self, name: &str) -> Option<&str> {
        self.tables
            .keys()
            .find(|t| t.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Table lookup tolerant of case and simple singular/plural differences
    /// ("tracks" resolves to `Track`, "category" to `Categories`).
    pub fn resolve_table(&self, name: &str) -> Option<&str> {
        self.find_table(name).or_else(|| {
            self.tables
                .keys()
                .find(|t| names_match(t, name))
                .map(String::as_str)
        })
    }

    /// Every table declaring a column with this name (case-insensitive).
    pub fn tables_with_column(&self, column: &str) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|(_, info)| info.has_column(column))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// All distinct column names across the schema, in table order.
    pub fn all_columns(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for info in self.tables.values() {
            for col in &info.columns {
                if !seen.iter().any(|c: &&str| c.eq_ignore_ascii_case(col)) {
                    seen.push(col.as_str());
                }
            }
        }
        seen
    }

    /// Every foreign-key edge as `(table, fk)`.
    pub fn foreign_key_edges(&self) -> Vec<(&str, &ForeignKey)> {
        self.tables
            .iter()
            .flat_map(|(name, info)| info.foreign_keys.iter().map(move |fk| (name.as_str(), fk)))
            .collect()
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.values().map(|t| t.row_count).sum()
    }

    pub fn total_columns(&self) -> usize {
        self.tables.values().map(|t| t.columns.len()).sum()
    }
}

/// Case-insensitive comparison tolerant of a trailing plural suffix.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return true;
    }
    singular(&a) == singular(&b)
}

/// Naive English singularization used for identifier matching.
pub fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "shes", "ches", "xes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}


#[cfg(test)]
mod tests {
    use super::test_support::chinook;
    use super::*;

    #[test]
    fn test_resolve_table_plural_and_case() {
        let schema = chinook();
        assert_eq!(schema.resolve_table("tracks"), Some("Track"));
        assert_eq!(schema.resolve_table("INVOICE"), Some("Invoice"));
        assert_eq!(schema.resolve_table("invoicelines"), Some("InvoiceLine"));
        assert_eq!(schema.resolve_table("playlist"), None);
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("categories"), "category");
        assert_eq!(singular("boxes"), "box");
        assert_eq!(singular("address"), "address");
        assert_eq!(singular("tracks"), "track");
    }

    #[test]
    fn test_tables_with_column() {
        let schema = chinook();
        assert_eq!(schema.tables_with_column("genreid"), vec!["Genre", "Track"]);
        assert!(schema.tables_with_column("Nope").is_empty());
    }

    #[test]
    fn test_foreign_key_edges_and_totals() {
        let schema = chinook();
        assert_eq!(schema.foreign_key_edges().len(), 6);
        assert_eq!(schema.total_rows(), 275 + 347 + 25 + 3503 + 59 + 412 + 2240);
    }

    #[test]
    fn test_json_roundtrip_with_defaults() {
        let json = r#"{"tables": {"Genre": {"columns": ["GenreId", "Name"]}}}"#;
        let schema: SchemaView = serde_json::from_str(json).unwrap();
        let genre = schema.table("Genre").unwrap();
        assert_eq!(genre.row_count, 0);
        assert!(genre.foreign_keys.is_empty());
    }

    #[test]
    fn test_from_json_file_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"tables": {}}"#).unwrap();
        assert!(SchemaView::from_json_file(&path).is_err());
    }
}
