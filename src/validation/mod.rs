//! Read-only safety gate applied to every query before execution.
//!
//! Keyword and comment checks run on a copy of the query with the contents
//! of string literals blanked, so `WHERE Name = 'Drop Zone'` is accepted
//! while `DROP TABLE` is not.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Empty query")]
    Empty,

    #[error("Only SELECT, WITH, EXPLAIN and read-only PRAGMA queries are allowed (query starts with '{0}')")]
    DisallowedStatement(String),

    #[error("Multiple statements are not allowed")]
    MultipleStatements,

    #[error("Comments (-- or /* */) are not allowed")]
    Comment,

    #[error("Forbidden operation: {0}")]
    ForbiddenKeyword(String),

    #[error("PRAGMA not allowed: {0}")]
    DangerousPragma(String),

    #[error("Access to system tables or database operations is restricted")]
    SystemTable,

    #[error("Suspicious pattern blocked: {0}")]
    Suspicious(&'static str),

    #[error("Invalid WITH clause: a CTE must be followed by a SELECT")]
    MalformedCte,
}

const ALLOWED_STARTERS: &[&str] = &["select", "with", "pragma", "explain"];

static FORBIDDEN_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|upsert|drop|alter|truncate|create|rename|attach|detach|reindex|vacuum|analyze|load_extension|writefile|readfile|replace\s+into)\b",
    )
    .unwrap()
});

/// Read-only schema introspection; every other PRAGMA is refused.
const INTROSPECTION_PRAGMAS: &[&str] = &[
    "table_info",
    "table_xinfo",
    "index_list",
    "index_info",
    "index_xinfo",
    "foreign_key_list",
];

static PRAGMA_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^pragma\s+(?:\w+\s*\.\s*)?(\w+)").unwrap());
/// Nothing, or a single parenthesized object name, may follow the pragma name.
static PRAGMA_ARGUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(?:\(\s*[\w'" ]*\s*\))?\s*;?\s*$"#).unwrap());

static SYSTEM_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsqlite_(?:master|schema)\b").unwrap());
static SQL_COLUMN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bsql\b").unwrap());

static SUSPICIOUS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)union\s+all\s+select\s+null", "UNION injection"),
        (r"(?i)'\s*or\s+'1'\s*=\s*'1", "tautology injection"),
        (r#"(?i)"\s*or\s+"1"\s*=\s*"1"#, "tautology injection"),
        (r"(?i)\bexec(?:ute)?\b", "EXEC command"),
        (r"(?i)\b(?:sp|xp)_\w", "stored procedure call"),
    ]
    .into_iter()
    .map(|(re, label)| (Regex::new(re).unwrap(), label))
    .collect()
});

static WORD_AS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bas\b").unwrap());
static WORD_SELECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bselect\b").unwrap());

/// Each char of `query` paired with whether it sits inside a quoted
/// literal. The delimiting quotes count as outside; a doubled quote inside a
/// literal is an escape and stays inside.
pub(crate) fn tag_literals(query: &str) -> Vec<(char, bool)> {
    let mut tagged = Vec::with_capacity(query.len());
    let mut quote: Option<char> = None;
    let mut chars = query.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => {
                if chars.peek() == Some(&q) {
                    chars.next();
                    tagged.push((c, true));
                    tagged.push((c, true));
                } else {
                    quote = None;
                    tagged.push((c, false));
                }
            }
            Some(_) => tagged.push((c, true)),
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                tagged.push((c, false));
            }
        }
    }
    tagged
}

/// Replace the contents of quoted literals with spaces, keeping the quotes
/// and byte offsets.
fn blank_literals(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for (c, inside) in tag_literals(query) {
        if inside {
            out.extend(std::iter::repeat(' ').take(c.len_utf8()));
        } else {
            out.push(c);
        }
    }
    out
}

fn check_cte(normalized: &str) -> Result<(), Rejection> {
    let Some(as_match) = WORD_AS.find(normalized) else {
        return Err(Rejection::MalformedCte);
    };
    let Some(open) = normalized[as_match.end()..]
        .find('(')
        .map(|i| i + as_match.end())
    else {
        return Err(Rejection::MalformedCte);
    };

    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in normalized[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close.ok_or(Rejection::MalformedCte)?;

    if WORD_SELECT.is_match(&normalized[close + 1..]) {
        Ok(())
    } else {
        Err(Rejection::MalformedCte)
    }
}

fn check_pragma(normalized: &str) -> Result<(), Rejection> {
    let Some(caps) = PRAGMA_NAME.captures(normalized) else {
        return Err(Rejection::DangerousPragma(String::new()));
    };
    let name = &caps[1];
    if !INTROSPECTION_PRAGMAS.contains(&name) {
        return Err(Rejection::DangerousPragma(name.to_string()));
    }
    let rest = &normalized[caps.get(0).map_or(0, |m| m.end())..];
    if rest.contains('=') || !PRAGMA_ARGUMENT.is_match(rest) {
        return Err(Rejection::DangerousPragma(format!("{} with a value", name)));
    }
    Ok(())
}

/// Accept `query` only when it is a single read-only statement.
pub fn validate(query: &str) -> Result<(), Rejection> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(Rejection::Empty);
    }

    let scrubbed = blank_literals(trimmed);
    let normalized = scrubbed.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = normalized.to_lowercase();

    if !ALLOWED_STARTERS
        .iter()
        .any(|s| lower.starts_with(s) && !lower[s.len()..].starts_with(|c: char| c.is_alphanumeric() || c == '_'))
    {
        let head: String = trimmed.chars().take(20).collect();
        return Err(Rejection::DisallowedStatement(head));
    }

    // A single trailing semicolon is fine, anything after one is not
    if let Some(pos) = scrubbed.find(';') {
        if !scrubbed[pos + 1..].trim().is_empty() {
            return Err(Rejection::MultipleStatements);
        }
    }

    if scrubbed.contains("--") || scrubbed.contains("/*") || scrubbed.contains("*/") {
        return Err(Rejection::Comment);
    }

    if let Some(m) = FORBIDDEN_KEYWORD.captures(&scrubbed) {
        let keyword = m[1].split_whitespace().next().unwrap_or(&m[1]).to_uppercase();
        return Err(Rejection::ForbiddenKeyword(keyword));
    }

    if lower.starts_with("pragma") {
        check_pragma(&lower)?;
    }

    // Reading stored DDL out of the catalog
    if SYSTEM_TABLE.is_match(&scrubbed) && SQL_COLUMN.is_match(&scrubbed) {
        return Err(Rejection::SystemTable);
    }

    // Injection signatures look inside literals too
    for (re, label) in SUSPICIOUS.iter() {
        if re.is_match(trimmed) {
            return Err(Rejection::Suspicious(label));
        }
    }

    if lower.starts_with("with") {
        check_cte(&lower)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_read_only_queries() {
        for q in [
            "SELECT Name FROM Track LIMIT 10",
            "select count(*) from Invoice;",
            "WITH t AS (SELECT TrackId FROM Track) SELECT COUNT(*) FROM t",
            "WITH a AS (SELECT 1), b AS (SELECT 2) SELECT * FROM a, b",
            "PRAGMA table_info(Track)",
            "EXPLAIN QUERY PLAN SELECT * FROM Track",
            "SELECT Name FROM Track WHERE Name = 'Drop Zone -- live'",
            "SELECT REPLACE(Name, 'a', 'b') FROM Artist",
            "SELECT UpdatedAt FROM Invoice",
        ] {
            assert_eq!(validate(q), Ok(()), "{}", q);
        }
    }

    #[test]
    fn test_rejects_non_select_starters() {
        assert!(matches!(
            validate("DROP TABLE Track"),
            Err(Rejection::DisallowedStatement(_))
        ));
        assert!(matches!(
            validate("selected FROM x"),
            Err(Rejection::DisallowedStatement(_))
        ));
        assert_eq!(validate("   "), Err(Rejection::Empty));
    }

    #[test]
    fn test_rejects_stacked_statements() {
        assert_eq!(
            validate("SELECT 1; DROP TABLE Track"),
            Err(Rejection::MultipleStatements)
        );
        assert_eq!(validate("SELECT ';' AS s"), Ok(()));
    }

    #[test]
    fn test_rejects_comments() {
        assert_eq!(validate("SELECT 1 -- hi"), Err(Rejection::Comment));
        assert_eq!(validate("SELECT /* x */ 1"), Err(Rejection::Comment));
    }

    #[test]
    fn test_rejects_write_keywords_anywhere() {
        assert_eq!(
            validate("WITH x AS (DELETE FROM Track) SELECT 1"),
            Err(Rejection::ForbiddenKeyword("DELETE".into()))
        );
        assert_eq!(
            validate("SELECT * FROM Track WHERE 1 = 1 AND load_extension('x')"),
            Err(Rejection::ForbiddenKeyword("LOAD_EXTENSION".into()))
        );
    }

    #[test]
    fn test_rejects_dangerous_pragmas() {
        assert_eq!(
            validate("PRAGMA journal_mode"),
            Err(Rejection::DangerousPragma("journal_mode".into()))
        );
        assert_eq!(
            validate("PRAGMA main.cache_size"),
            Err(Rejection::DangerousPragma("cache_size".into()))
        );
        assert_eq!(
            validate("PRAGMA database_list"),
            Err(Rejection::DangerousPragma("database_list".into()))
        );
    }

    #[test]
    fn test_rejects_pragma_assignments() {
        for q in [
            "PRAGMA user_version = 5",
            "PRAGMA foreign_keys = OFF",
            "PRAGMA application_id=7",
            "PRAGMA table_info = 1",
            "PRAGMA table_info(Track) = 1",
            "PRAGMA index_list(Track, 1)",
        ] {
            assert!(
                matches!(validate(q), Err(Rejection::DangerousPragma(_))),
                "{}",
                q
            );
        }
    }

    #[test]
    fn test_accepts_introspection_pragmas() {
        for q in [
            "PRAGMA table_info(Track)",
            "pragma main.table_xinfo('Track');",
            "PRAGMA foreign_key_list(InvoiceLine)",
            "PRAGMA index_list(\"Track\")",
            "PRAGMA index_info(IFK_TrackGenreId)",
        ] {
            assert_eq!(validate(q), Ok(()), "{}", q);
        }
    }

    #[test]
    fn test_rejects_system_sql_reads() {
        assert_eq!(
            validate("SELECT sql FROM sqlite_master"),
            Err(Rejection::SystemTable)
        );
        assert_eq!(validate("SELECT name FROM sqlite_master"), Ok(()));
    }

    #[test]
    fn test_rejects_injection_signatures() {
        assert!(matches!(
            validate("SELECT Name FROM Track WHERE Name = '' OR '1'='1'"),
            Err(Rejection::Suspicious(_))
        ));
        assert!(matches!(
            validate("SELECT Name FROM Track UNION ALL SELECT NULL"),
            Err(Rejection::Suspicious(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_cte() {
        assert_eq!(validate("WITH t SELECT 1"), Err(Rejection::MalformedCte));
        assert_eq!(
            validate("WITH t AS (SELECT 1"),
            Err(Rejection::MalformedCte)
        );
        assert_eq!(
            validate("WITH t AS (SELECT 1) PRAGMA x"),
            Err(Rejection::MalformedCte)
        );
    }
}
