//! Extraction of query text from free-form completions.

use std::sync::LazyLock;

use regex::Regex;

use super::{GeneratedQuery, GenerationError};
use crate::validation::tag_literals;

static FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```[a-z]*\s*(.*?)```").unwrap());
static SQL_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)\bSQL:\s*(.*)$").unwrap());
static REASONING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)REASONING:?\s*(.*?)(?:\bSQL:|```|\z)").unwrap());
static BARE_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ims)^\s*((?:WITH|SELECT)\s+.+?)(?:\n\s*\n|\z)").unwrap()
});
static QUERY_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:select|with|pragma|explain)\b").unwrap());

static FENCE_MARK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)```[a-z]*").unwrap());
static PROSE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\n\s*(?:note|explanation|this query|the query|here)\b").unwrap()
});

/// Normalize extracted query text: drop fences, trailing prose, comments
/// and trailing statement terminators, and collapse whitespace. Quoted
/// literals pass through untouched. Anything after an inner `;` is kept so
/// the validation gate sees stacked statements.
pub fn clean_query(raw: &str) -> String {
    let text = FENCE_MARK.replace_all(raw, "");
    let mut text: &str = &text;
    if let Some(m) = PROSE_TAIL.find(text) {
        text = &text[..m.start()];
    }

    let tagged = tag_literals(text);
    let mut out = String::with_capacity(text.len());
    // Byte offsets in `out` of terminators outside literals
    let mut terminators = Vec::new();
    let mut gap = false;
    let mut i = 0;

    while i < tagged.len() {
        let (c, inside) = tagged[i];
        let next = tagged.get(i + 1).map(|(n, _)| *n);

        if !inside && c == '-' && next == Some('-') {
            while i < tagged.len() && tagged[i].0 != '\n' {
                i += 1;
            }
            gap = true;
            continue;
        }
        if !inside && c == '/' && next == Some('*') {
            i += 2;
            while i < tagged.len() && !(tagged[i].0 == '*' && tagged.get(i + 1).map(|t| t.0) == Some('/')) {
                i += 1;
            }
            i += 2;
            gap = true;
            continue;
        }
        if !inside && c.is_whitespace() {
            gap = true;
            i += 1;
            continue;
        }

        if gap && !out.is_empty() {
            out.push(' ');
        }
        gap = false;
        if !inside && c == ';' {
            terminators.push(out.len());
        }
        out.push(c);
        i += 1;
    }

    while let Some(&pos) = terminators.last() {
        if pos + 1 != out.len() {
            break;
        }
        terminators.pop();
        out.truncate(pos);
        out.truncate(out.trim_end().len());
    }
    out
}

/// Parse a completion into query text plus optional reasoning.
///
/// Accepted shapes, in order: a fenced block holding a query, a `SQL:`
/// section, or a paragraph starting with SELECT/WITH on its own line.
pub fn parse_completion(completion: &str) -> Result<GeneratedQuery, GenerationError> {
    let completion = completion.trim();

    let fenced = FENCED
        .captures_iter(completion)
        .map(|c| c.get(1).map_or("", |m| m.as_str()))
        .find(|body| QUERY_KEYWORD.is_match(body));

    let raw = fenced
        .or_else(|| {
            SQL_MARKER
                .captures(completion)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
        })
        .or_else(|| {
            BARE_QUERY
                .captures(completion)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
        })
        .ok_or_else(|| GenerationError::Malformed("no query found in completion".to_string()))?;

    let query = clean_query(raw);
    if query.is_empty() {
        return Err(GenerationError::Malformed("empty query section".to_string()));
    }

    let reasoning = REASONING
        .captures(completion)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|r| !r.is_empty());

    Ok(GeneratedQuery { query, reasoning })
}
