//! Folds a clarification reply back into the ambiguous question.

use regex::Regex;

use super::{AmbiguityFinding, ClarificationState, Question};

/// How a reply was mapped onto the finding's candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolution {
    Candidate(String),
    Freeform(String),
}

fn numbers(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .collect()
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '%')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn resolve(finding: &AmbiguityFinding, reply: &str) -> Resolution {
    let reply_norm = reply.trim().to_lowercase();

    if let Some(exact) = finding.options.iter().find(|o| o.to_lowercase() == reply_norm) {
        return Resolution::Candidate(exact.clone());
    }
    if let Some(inner) = finding
        .options
        .iter()
        .find(|o| reply_norm.contains(&o.to_lowercase()))
    {
        return Resolution::Candidate(inner.clone());
    }
    if !reply_norm.is_empty() {
        if let Some(outer) = finding
            .options
            .iter()
            .find(|o| o.to_lowercase().contains(&reply_norm))
        {
            return Resolution::Candidate(outer.clone());
        }
    }

    // Keyword overlap; every number in the reply must appear in the candidate
    let reply_words = words(&reply_norm);
    let reply_numbers = numbers(&reply_norm);
    let mut best: Option<(usize, &String)> = None;
    for option in &finding.options {
        let option_lower = option.to_lowercase();
        let option_numbers = numbers(&option_lower);
        if !reply_numbers.iter().all(|n| option_numbers.contains(n)) {
            continue;
        }
        let option_words = words(&option_lower);
        let overlap = reply_words
            .iter()
            .filter(|w| w.as_str() != finding.term && option_words.contains(w))
            .count();
        if overlap > 0 && best.map_or(true, |(score, _)| overlap > score) {
            best = Some((overlap, option));
        }
    }

    match best {
        Some((_, option)) => Resolution::Candidate(option.clone()),
        None => Resolution::Freeform(reply.trim().to_string()),
    }
}

/// Byte ranges of every standalone occurrence of the finding's term, or just
/// the recorded position when the word-boundary search finds nothing.
fn occurrences(text: &str, finding: &AmbiguityFinding) -> Vec<(usize, usize)> {
    let found: Vec<(usize, usize)> =
        Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&finding.term)))
            .map(|re| re.find_iter(text).map(|m| (m.start(), m.end())).collect())
            .unwrap_or_default();
    if !found.is_empty() {
        return found;
    }
    let end = finding.position + finding.term.len();
    match text.get(finding.position..end) {
        Some(slice) if slice.eq_ignore_ascii_case(&finding.term) => vec![(finding.position, end)],
        _ => Vec::new(),
    }
}

/// `text` with each range replaced by `with`. Ranges are ascending and disjoint.
fn splice(text: &str, ranges: &[(usize, usize)], with: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in ranges {
        out.push_str(&text[cursor..start]);
        out.push_str(with);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn tidy(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn without_terminal(text: &str) -> &str {
    text.trim_end_matches(['?', '.', '!', ' '])
}

/// Merge a clarification reply into the pending question.
///
/// Consumes the state. A reply matching a candidate replaces every
/// occurrence of the term with that candidate; any other reply removes the
/// term and is appended as a `(meaning: ...)` qualifier. Never fails.
pub fn merge(state: ClarificationState, reply: &str) -> Question {
    let ClarificationState { question, finding } = state;
    let text = question.text();
    let ranges = occurrences(text, &finding);

    let merged = match resolve(&finding, reply) {
        Resolution::Candidate(candidate) if !ranges.is_empty() => splice(text, &ranges, &candidate),
        Resolution::Candidate(candidate) => {
            format!("{} (meaning: {})", without_terminal(text), candidate)
        }
        Resolution::Freeform(raw) => {
            let base = tidy(&splice(text, &ranges, ""));
            let base = without_terminal(&base);
            if raw.is_empty() {
                base.to_string()
            } else {
                format!("{} (meaning: {})", base, raw)
            }
        }
    };

    let merged = tidy(&merged);
    tracing::debug!(term = %finding.term, merged = %merged, "Merged clarification");
    question.resolve(merged)
}
