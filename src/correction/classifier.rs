//! Raw error text to [`ErrorClassification`].
//!
//! Classification is two passes: an ordered signature match over the error
//! text (first match wins), then a join upgrade that recognizes a missing
//! column which is really a table reached through a foreign key.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::fixes::{has_bare_alias, has_trailing_comma, DeterministicFix};
use super::{ErrorClassification, ErrorKind};
use crate::intent::patterns::ERROR_SIGNATURES;
use crate::schema::{names_match, SchemaView};

static TABLE_REFS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+["`\[]?(\w+)["`\]]?(?:\s+(?:AS\s+)?(\w+))?"#).unwrap()
});

const CLAUSE_WORDS: &[&str] = &[
    "where", "join", "inner", "left", "right", "outer", "cross", "full", "on", "group", "order",
    "limit", "having", "union", "natural", "using", "except", "intersect", "window",
];

/// `(table, alias)` pairs from the query's FROM and JOIN clauses.
pub fn table_references(query: &str) -> Vec<(String, Option<String>)> {
    TABLE_REFS
        .captures_iter(query)
        .filter_map(|caps| {
            let table = caps.get(1)?.as_str().to_string();
            let alias = caps
                .get(2)
                .map(|m| m.as_str())
                .filter(|a| !CLAUSE_WORDS.contains(&a.to_lowercase().as_str()))
                .map(String::from);
            Some((table, alias))
        })
        .collect()
}

fn resolve_qualifier<'s>(query: &str, qualifier: &str, schema: &'s SchemaView) -> Option<&'s str> {
    table_references(query)
        .into_iter()
        .find(|(table, alias)| {
            alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
                || table.eq_ignore_ascii_case(qualifier)
        })
        .and_then(|(table, _)| schema.find_table(&table))
}

fn split_qualified(identifier: &str) -> (Option<&str>, &str) {
    match identifier.rsplit_once('.') {
        Some((qualifier, bare)) => (Some(qualifier), bare),
        None => (None, identifier),
    }
}

fn char_set_similarity(a: &str, b: &str) -> f64 {
    let a: BTreeSet<char> = a.chars().collect();
    let b: BTreeSet<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(&b).count();
    common as f64 / a.len().max(b.len()) as f64
}

/// Closest differently-spelled candidate for `name`: substring relation
/// first, then character-set similarity above 0.7.
fn closest<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    let lower = name.to_lowercase();
    let differs = |c: &&&'a str| !c.eq_ignore_ascii_case(name);

    if lower.len() >= 3 {
        if let Some(found) = candidates.iter().filter(differs).find(|c| {
            let c = c.to_lowercase();
            c.contains(&lower) || lower.contains(&c)
        }) {
            return Some(*found);
        }
    }
    candidates
        .iter()
        .filter(differs)
        .map(|c| (c, char_set_similarity(&lower, &c.to_lowercase())))
        .filter(|(_, score)| *score > 0.7)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| *c)
}

fn similar_column<'s>(name: &str, query: &str, schema: &'s SchemaView) -> Option<&'s str> {
    // Columns of the tables the query reads take precedence
    let referenced: Vec<&str> = table_references(query)
        .iter()
        .filter_map(|(t, _)| schema.find_table(t))
        .filter_map(|t| schema.table(t))
        .flat_map(|info| info.columns.iter().map(String::as_str))
        .collect();
    closest(name, &referenced).or_else(|| closest(name, &schema.all_columns()))
}

fn similar_table<'s>(name: &str, schema: &'s SchemaView) -> Option<&'s str> {
    if let Some(t) = schema
        .table_names()
        .find(|t| !t.eq_ignore_ascii_case(name) && names_match(t, name))
    {
        return Some(t);
    }
    let tables: Vec<&str> = schema.table_names().collect();
    closest(name, &tables)
}

fn from_signature(
    kind: ErrorKind,
    fragment: Option<&str>,
    query: &str,
    schema: &SchemaView,
) -> ErrorClassification {
    let frag = fragment.unwrap_or_default();
    let base = |analysis: String| {
        let c = ErrorClassification::new(kind, analysis);
        match fragment {
            Some(f) => c.with_fragment(f),
            None => c,
        }
    };

    match kind {
        ErrorKind::ColumnNotFound => {
            let (_, bare) = split_qualified(frag);
            let c = base(format!("Column '{}' doesn't exist", frag));
            match similar_column(bare, query, schema) {
                Some(similar) => c
                    .with_hint(format!("Did you mean '{}'?", similar))
                    .with_fix(DeterministicFix::Rename {
                        from: bare.to_string(),
                        to: similar.to_string(),
                    }),
                None => c.with_hint("Use only columns listed in the schema"),
            }
        }
        ErrorKind::TableNotFound => {
            let (_, bare) = split_qualified(frag);
            let c = base(format!("Table '{}' doesn't exist", frag));
            match similar_table(bare, schema) {
                Some(similar) => c
                    .with_hint(format!("Did you mean '{}'?", similar))
                    .with_fix(DeterministicFix::Rename {
                        from: bare.to_string(),
                        to: similar.to_string(),
                    }),
                None => c.with_hint("Use only tables listed in the schema"),
            }
        }
        ErrorKind::AmbiguousColumn => {
            let (_, bare) = split_qualified(frag);
            let owners = schema.tables_with_column(bare);
            let c = base(format!(
                "Column '{}' exists in multiple tables: {}",
                bare,
                owners.join(", ")
            ));
            match owners.first() {
                Some(first) => c.with_hint(format!("Qualify with table name: {}.{}", first, bare)),
                None => c.with_hint("Qualify every column with its table alias"),
            }
        }
        ErrorKind::ReservedWordCollision => {
            let c = base(format!("Reserved word '{}' used as an identifier", frag))
                .with_hint(format!("Quote or rename the '{}' identifier", frag));
            if has_bare_alias(query, frag) {
                c.with_fix(DeterministicFix::QuoteReservedWord {
                    word: frag.to_string(),
                })
            } else {
                c
            }
        }
        ErrorKind::SyntaxNearKeyword | ErrorKind::SyntaxError => {
            let analysis = match fragment {
                Some(token) => format!("SQL syntax error near '{}'", token),
                None => "SQL syntax error".to_string(),
            };
            let c = base(analysis).with_hint("Regenerate the query with corrected SQLite syntax");
            if has_trailing_comma(query) {
                c.with_fix(DeterministicFix::StripTrailingComma)
            } else {
                c
            }
        }
        ErrorKind::UniqueViolation => {
            base("Unique constraint violated".to_string()).with_hint("The query must only read data")
        }
        ErrorKind::GroupByRequired => base("Aggregate used without a matching GROUP BY".to_string())
            .with_hint("Add a GROUP BY clause for every non-aggregated column"),
        ErrorKind::AggregateError => base("Aggregate function misused".to_string())
            .with_hint("Filter aggregates with HAVING or a subquery, never in WHERE"),
        ErrorKind::TypeMismatch => base("Data type mismatch in comparison".to_string())
            .with_hint("CAST values so both sides of a comparison have the same type"),
        ErrorKind::FunctionNotFound => base(format!("SQL function '{}' not found", frag))
            .with_hint("Use SQLite built-ins only (strftime for dates, || for concatenation)"),
        _ => base("Query error occurred".to_string()).with_hint("Try a different approach"),
    }
}

/// Second pass: a missing column whose bare name is a table, reachable via
/// a `<Table>Id` column, means the query forgot a JOIN.
fn upgrade_join(first: ErrorClassification, query: &str, schema: &SchemaView) -> ErrorClassification {
    if first.kind != ErrorKind::ColumnNotFound {
        return first;
    }
    let Some(fragment) = first.fragment.as_deref() else {
        return first;
    };
    let (qualifier, bare) = split_qualified(fragment);
    let Some(target) = schema.find_table(bare) else {
        return first;
    };
    let fk_name = format!("{}Id", target);
    let has_fk = |table: &str| {
        table != target && schema.table(table).is_some_and(|info| info.has_column(&fk_name))
    };

    let referencing = qualifier
        .and_then(|q| resolve_qualifier(query, q, schema))
        .filter(|t| has_fk(*t))
        .or_else(|| schema.table_names().find(|t| has_fk(*t)));
    let Some(referencing) = referencing else {
        return first;
    };
    let Some(info) = schema.table(referencing) else {
        return first;
    };
    let join_column = info.find_column(&fk_name).unwrap_or(&fk_name).to_string();
    let target_column = info
        .foreign_keys
        .iter()
        .find(|fk| fk.column.eq_ignore_ascii_case(&join_column))
        .map(|fk| fk.target_column.clone())
        .unwrap_or_else(|| join_column.clone());

    tracing::debug!(
        fragment,
        join_table = target,
        join_column = %join_column,
        "Upgraded missing column to missing join"
    );

    ErrorClassification {
        kind: ErrorKind::JoinRelationshipMissing,
        fragment: Some(fragment.to_string()),
        analysis: format!(
            "Column '{}' doesn't exist. {} is a table; {} references it through '{}'",
            fragment, target, referencing, join_column
        ),
        fix_hint: Some(format!(
            "JOIN {} ON {}.{} = {}.{} and select its columns",
            target, referencing, join_column, target, target_column
        )),
        requires_join: true,
        join_table: Some(target.to_string()),
        join_column: Some(join_column),
        replacement: None,
        fix: None,
    }
}

/// Classify the raw error text of a failed execution of `query`.
pub fn classify(error_text: &str, query: &str, schema: &SchemaView) -> ErrorClassification {
    let first = ERROR_SIGNATURES
        .iter()
        .find_map(|(kind, pattern)| {
            pattern.captures(error_text).map(|caps| {
                let fragment = caps.get(1).map(|m| m.as_str());
                from_signature(*kind, fragment, query, schema)
            })
        })
        .unwrap_or_else(|| {
            ErrorClassification::new(
                ErrorKind::Unrecognized,
                format!("Unrecognized error: {}", error_text.trim()),
            )
            .with_hint("Try a different approach to the question")
        });

    let classified = upgrade_join(first, query, schema);
    tracing::debug!(kind = %classified.kind, "Classified failure");
    classified
}
