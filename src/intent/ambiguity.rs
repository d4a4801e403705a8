//! Ambiguity detection.
//!
//! Scans the current turn's question for vague registry terms and decides
//! whether the pipeline should pause for a clarification. Guards discard
//! matches whose wording already carries an explicit quantity, window or
//! measure. Pure and deterministic.

use serde::{Deserialize, Serialize};

use super::patterns::{
    AmbiguityCategory, AmbiguousTerm, Priority, AMBIGUOUS_TERMS, ATTACHED_NUMBER,
    INTERROGATIVE_BEFORE, MEASURE_AFTER, NUMERIC_COMPARISON, ROW_COUNT, TERM_MATCHERS,
    TIME_WINDOW,
};
use crate::schema::SchemaView;

/// The single ambiguity reported for a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguityFinding {
    /// Registry term, lowercase
    pub term: String,
    pub category: AmbiguityCategory,
    pub priority: Priority,
    /// Candidate resolutions in registry order
    pub options: Vec<String>,
    /// Clarification prompt enumerating every option
    pub prompt: String,
    /// Byte offset of the matched occurrence in the question
    pub position: usize,
}

/// Question-wide signals computed once per scan.
struct Signals {
    time_window: bool,
    row_count: bool,
    numeric_comparison: bool,
}

impl Signals {
    fn scan(lower: &str) -> Self {
        Self {
            time_window: TIME_WINDOW.is_match(lower),
            row_count: ROW_COUNT.is_match(lower),
            numeric_comparison: NUMERIC_COMPARISON.is_match(lower),
        }
    }
}

fn is_guarded(entry: &AmbiguousTerm, before: &str, after: &str, signals: &Signals) -> bool {
    if ATTACHED_NUMBER.is_match(after) || INTERROGATIVE_BEFORE.is_match(before) {
        return true;
    }
    match entry.category {
        AmbiguityCategory::Temporal => signals.time_window,
        AmbiguityCategory::Ranking => signals.row_count || MEASURE_AFTER.is_match(after),
        AmbiguityCategory::Quantity | AmbiguityCategory::Size | AmbiguityCategory::Comparison => {
            signals.numeric_comparison
        }
        AmbiguityCategory::Status => false,
    }
}

/// Detect the highest-priority unguarded ambiguous term in `question`.
///
/// `question` must already be stripped of any conversational context. The
/// schema is accepted for interface symmetry with the other detectors but is
/// never used to suppress a match.
pub fn detect(question: &str, _schema: &SchemaView) -> Option<AmbiguityFinding> {
    let lower = question.to_lowercase();
    if lower.trim().is_empty() {
        return None;
    }
    let signals = Signals::scan(&lower);

    let mut best: Option<(Priority, usize, &AmbiguousTerm)> = None;

    for (entry, matcher) in AMBIGUOUS_TERMS.iter().zip(TERM_MATCHERS.iter()) {
        for m in matcher.find_iter(&lower) {
            let before = &lower[..m.start()];
            let after = &lower[m.end()..];
            if is_guarded(entry, before, after, &signals) {
                tracing::debug!(term = entry.term, position = m.start(), "Ambiguous term guarded");
                continue;
            }
            let key = (entry.category.priority(), m.start());
            if best.map_or(true, |(p, pos, _)| key < (p, pos)) {
                best = Some((key.0, key.1, entry));
            }
            // Later occurrences of the same term can't rank higher
            break;
        }
    }

    let (priority, position, entry) = best?;
    tracing::debug!(term = entry.term, ?priority, position, "Ambiguity detected");

    Some(AmbiguityFinding {
        term: entry.term.to_string(),
        category: entry.category,
        priority,
        options: entry.options.iter().map(|o| o.to_string()).collect(),
        prompt: entry.prompt(),
        position,
    })
}
