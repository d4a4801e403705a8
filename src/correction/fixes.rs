//! Textual corrections derivable from the error alone.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeterministicFix {
    /// Replace a bare identifier, keeping any qualifier in front of it
    Rename { from: String, to: String },
    /// Drop a comma directly before a clause keyword or the end of input
    StripTrailingComma,
    /// Double-quote a reserved word used as an alias
    QuoteReservedWord { word: String },
}

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),\s*(\bFROM\b|\bWHERE\b|\bGROUP\b|\bORDER\b|\bLIMIT\b|;|$)").unwrap()
});

pub fn has_trailing_comma(query: &str) -> bool {
    TRAILING_COMMA.is_match(query.trim_end())
}

fn alias_pattern(word: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\bAS\s+({})\b", regex::escape(word))).ok()
}

pub fn has_bare_alias(query: &str, word: &str) -> bool {
    alias_pattern(word).is_some_and(|re| re.is_match(query))
}

/// Apply `fix` to `query`. Returns `None` when the fix changes nothing.
pub fn apply_fix(query: &str, fix: &DeterministicFix) -> Option<String> {
    let fixed = match fix {
        DeterministicFix::Rename { from, to } => {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(from))).ok()?;
            re.replace_all(query, regex::NoExpand(to.as_str())).into_owned()
        }
        DeterministicFix::StripTrailingComma => TRAILING_COMMA
            .replace_all(query.trim_end(), " $1")
            .trim_end()
            .to_string(),
        DeterministicFix::QuoteReservedWord { word } => {
            let re = alias_pattern(word)?;
            re.replace_all(query, |caps: &regex::Captures| format!("AS \"{}\"", &caps[1]))
                .into_owned()
        }
    };
    (fixed != query).then_some(fixed)
}
