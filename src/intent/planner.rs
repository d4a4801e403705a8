//! Pattern-based query planning.
//!
//! The planner extracts structural signals from the resolved question and
//! classifies its complexity. It never emits query text; the plan is advisory
//! input for the text generator.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::{names_match, SchemaView};

/// Planner policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Row limit applied to ranking questions without an explicit count.
    /// Default: 10
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

fn default_limit() -> u32 {
    10
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    MultiStep,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::MultiStep => "multi_step",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregation {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Select,
    Count,
    Exists,
    Compare,
    Aggregation,
}

/// The inputs complexity classification depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComplexitySignals {
    pub intersection: bool,
    pub subquery_needed: bool,
    pub negation: bool,
    pub needs_join: bool,
    pub aggregation: bool,
    pub grouping: bool,
}

impl ComplexitySignals {
    /// First matching rule wins.
    pub fn classify(&self) -> Complexity {
        if self.intersection && self.subquery_needed {
            Complexity::MultiStep
        } else if self.negation || self.subquery_needed {
            Complexity::Complex
        } else if self.needs_join || self.aggregation || self.grouping {
            Complexity::Moderate
        } else {
            Complexity::Simple
        }
    }
}

/// Structured signals for one resolved question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub complexity: Complexity,
    pub intent: QueryIntent,
    /// Tables the question references, in schema order
    pub tables: Vec<String>,
    pub needs_join: bool,
    pub aggregation: Option<Aggregation>,
    pub grouping: bool,
    /// Schema identifier the question groups by, when one was found
    pub group_by: Option<String>,
    pub sorting: Option<SortOrder>,
    pub limit: Option<u32>,
    pub distinct: bool,
    pub negation: bool,
    pub subquery_needed: bool,
    pub intersection: bool,
    pub filter_hints: Vec<String>,
    /// Human-readable planning notes, in detection order
    pub reasoning: Vec<String>,
}

impl QueryPlan {
    pub fn signals(&self) -> ComplexitySignals {
        ComplexitySignals {
            intersection: self.intersection,
            subquery_needed: self.subquery_needed,
            negation: self.negation,
            needs_join: self.needs_join,
            aggregation: self.aggregation.is_some(),
            grouping: self.grouping,
        }
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

static COUNT_INTENT: LazyLock<Regex> =
    LazyLock::new(|| re(r"\bhow many\b|\bcount\b|\bnumber of\b|\btotal number\b"));
static EXISTS_INTENT: LazyLock<Regex> =
    LazyLock::new(|| re(r"\bis there\b|\bare there\b|\bdo any\b|\bdoes any\b|\bexists?\b"));
static COMPARE_INTENT: LazyLock<Regex> =
    LazyLock::new(|| re(r"\bcompare\b|\bdifference between\b|\bversus\b|\bvs\.?\b"));

static MULTI_STEP: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (re(r"\bboth\b.+\band\b.+"), "records must match multiple conditions"),
        (re(r"\b(?:purchased|bought)\b.+\band\b.+"), "multiple purchase conditions"),
        (re(r"\bwho\b.+\band also\b.+"), "multiple action conditions"),
        (re(r".+\bas well as\b.+"), "dual condition"),
    ]
});

static STRONG_NEGATION: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (re(r"\bnever\b"), "exclusion via 'never'"),
        (re(r"\bwithout\b"), "exclusion via 'without'"),
        (re(r"\bnot (?:purchased|bought|ordered)\b"), "has not purchased"),
        (re(r"\bno (?:purchases?|orders?|sales?|invoices?)\b"), "no matching records"),
        (re(r"\b(?:haven't|hasn't|have not|has not)\b"), "exclusion"),
        (re(r"\b(?:doesn't|don't|do not|does not) have\b"), "does not have"),
    ]
});

static WEAK_NEGATION: LazyLock<Regex> =
    LazyLock::new(|| re(r"\bnot\b|\bno\b|\bexcept\b|\bexclud(?:e|es|ing)\b|\bmissing\b"));

static DUPLICATE_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| re(r"\b(?:no|without) duplicates?\b"));

static WEAK_INTERSECTION: LazyLock<Regex> =
    LazyLock::new(|| re(r"\bboth\b|\band also\b|\bas well as\b|\bmultiple\b|\ball of\b"));

static AVERAGE_COMPARISON: LazyLock<Regex> =
    LazyLock::new(|| re(r"\b(?:above|below|more than|less than|higher than|lower than) (?:the )?average\b"));

static AGGREGATIONS: LazyLock<Vec<(Regex, Aggregation)>> = LazyLock::new(|| {
    vec![
        (
            re(r"\bsum\b|\btotal (?:value|amount|cost|price|revenue|sales|spent|spending)\b|\btotal\b.*\b(?:by|per)\b"),
            Aggregation::Sum,
        ),
        (re(r"\bcount\b|\bnumber of\b|\bhow many\b"), Aggregation::Count),
        (re(r"\baverage\b|\bavg\b|\bmean\b"), Aggregation::Avg),
        (
            re(r"\bmax\b|\bmaximum\b|\bhighest\b|\blargest\b|\bbiggest\b|\bmost\b"),
            Aggregation::Max,
        ),
        (
            re(r"\bmin\b|\bminimum\b|\blowest\b|\bsmallest\b|\bleast\b"),
            Aggregation::Min,
        ),
    ]
});

static GROUPING: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"\bgrouped by (\w+)"),
        re(r"\bfor each (\w+)"),
        re(r"\bper (\w+)"),
        re(r"\beach (\w+)"),
        re(r"\bby (\w+)"),
    ]
});

static DESC_CUES: LazyLock<Regex> = LazyLock::new(|| {
    re(r"\btop\b|\bhighest\b|\bmost\b|\blargest\b|\bbiggest\b|\bmaximum\b|\bbest\b|\bgreatest\b|\bnewest\b|\blatest\b|\brecent\b|\bdescending\b")
});
static ASC_CUES: LazyLock<Regex> = LazyLock::new(|| {
    re(r"\bbottom\b|\blowest\b|\bleast\b|\bsmallest\b|\bminimum\b|\bworst\b|\boldest\b|\bearliest\b|\bascending\b")
});

static LIMITS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        re(r"\btop\s+(\d+)\b"),
        re(r"\bfirst\s+(\d+)\b"),
        // "last 7 days" is a time window, not a limit
        re(r"\blast\s+(\d+)\b(\s+(?:hours?|days?|weeks?|months?|quarters?|years?)\b)?"),
        re(r"\b(\d+)\s+(?:top|best|worst|highest|lowest|most|least)\b"),
        re(r"\blimit\s+(?:to\s+)?(\d+)\b"),
        re(r"\b(\d+)\s+(?:results?|rows?|records?)\b"),
    ]
});

static RANKING_WORDS: LazyLock<Regex> =
    LazyLock::new(|| re(r"\btop\b|\bbest\b|\bworst\b|\bhighest\b|\blowest\b|\bmost\b|\bleast\b"));

static DISTINCT: LazyLock<Regex> = LazyLock::new(|| {
    re(r"\bunique\b|\bdistinct\b|\bdifferent\b|\bno duplicates?\b|\bwithout duplicates?\b")
});

static FILTERS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (re(r"\bwhere\b"), "explicit condition"),
        (re(r"\bafter\b|\bsince\b"), "date filter (after)"),
        (re(r"\bbefore\b"), "date filter (before)"),
        (re(r"\bbetween\b"), "range filter"),
        (re(r"\bin (?:19|20)\d{2}\b"), "year filter"),
        (re(r"\bgreater than\b|\bmore than\b|\babove\b|\bover\b"), "greater than (>)"),
        (re(r"\bless than\b|\bfewer than\b|\bbelow\b|\bunder\b"), "less than (<)"),
        (re(r"\bequal to\b|\bexactly\b"), "equality (=)"),
        (re(r"\blike\b|\bcontains?\b|\bincludes?\b"), "text search (LIKE)"),
        (re(r"\bstarts with\b|\bbegins with\b"), "prefix match"),
        (re(r"\bends with\b"), "suffix match"),
    ]
});

static VALUE_MENTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (re(r"\b(?:from|in) ([A-Z][a-z]+)\b"), "location value"),
        (re(r#""([^"]+)""#), "quoted value"),
        (re(r"'([^']+)'"), "quoted value"),
    ]
});

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Tables the question names directly, or through a column only one table owns.
fn referenced_tables(words: &[String], schema: &SchemaView) -> Vec<String> {
    let mut found = BTreeSet::new();
    let mut candidates: Vec<String> = words.to_vec();
    candidates.extend(words.windows(2).map(|w| format!("{}{}", w[0], w[1])));

    for word in &candidates {
        if let Some(table) = schema.resolve_table(word) {
            found.insert(table.to_string());
            continue;
        }
        let owners: Vec<&str> = schema
            .tables
            .iter()
            .filter(|(_, info)| info.columns.iter().any(|c| names_match(c, word)))
            .map(|(name, _)| name.as_str())
            .collect();
        if let [owner] = owners.as_slice() {
            found.insert(owner.to_string());
        }
    }
    found.into_iter().collect()
}

fn schema_identifier(word: &str, schema: &SchemaView) -> Option<String> {
    if let Some(table) = schema.resolve_table(word) {
        return Some(table.to_string());
    }
    schema
        .all_columns()
        .into_iter()
        .find(|c| names_match(c, word))
        .map(String::from)
}

fn detect_limit(lower: &str) -> Option<u32> {
    for pattern in LIMITS.iter() {
        for caps in pattern.captures_iter(lower) {
            // Second group only exists on the time-window pattern
            if caps.get(2).is_some() {
                continue;
            }
            let n = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
            if let Some(n) = n.filter(|n| *n > 0) {
                return Some(n);
            }
        }
    }
    None
}

/// Build the plan for a resolved question.
pub fn plan(question: &str, schema: &SchemaView, config: &PlannerConfig) -> QueryPlan {
    let lower = question.to_lowercase();
    let words = tokens(question);
    let mut reasoning = Vec::new();

    let tables = referenced_tables(&words, schema);
    reasoning.push(if tables.is_empty() {
        "No table named directly in the question".to_string()
    } else {
        format!("Identified {} relevant table(s): {}", tables.len(), tables.join(", "))
    });
    let needs_join = tables.len() > 1;

    let mut intent = if COUNT_INTENT.is_match(&lower) {
        reasoning.push("Question asks for a count of records".to_string());
        QueryIntent::Count
    } else if EXISTS_INTENT.is_match(&lower) {
        reasoning.push("Question checks whether records exist".to_string());
        QueryIntent::Exists
    } else if COMPARE_INTENT.is_match(&lower) {
        reasoning.push("Question compares entities".to_string());
        QueryIntent::Compare
    } else {
        QueryIntent::Select
    };

    let mut intersection = false;
    let mut subquery_needed = false;
    let mut negation = false;

    if let Some((_, note)) = MULTI_STEP.iter().find(|(p, _)| p.is_match(&lower)) {
        intersection = true;
        subquery_needed = true;
        reasoning.push(format!("Multi-step pattern: {}", note));
    }

    // Uniqueness phrasing is not a negation
    let negation_text = DUPLICATE_PHRASE.replace_all(&lower, " ");
    if let Some((_, note)) = STRONG_NEGATION.iter().find(|(p, _)| p.is_match(&negation_text)) {
        negation = true;
        subquery_needed = true;
        reasoning.push(format!("Negation detected: {}", note));
    } else if WEAK_NEGATION.is_match(&negation_text) {
        negation = true;
        reasoning.push("Negation pattern, may need an anti-join".to_string());
    }

    if !intersection && WEAK_INTERSECTION.is_match(&lower) {
        intersection = true;
        reasoning.push("Intersection pattern, may need INTERSECT or GROUP BY HAVING".to_string());
    }

    if AVERAGE_COMPARISON.is_match(&lower) {
        subquery_needed = true;
        reasoning.push("Comparison against an average needs a subquery".to_string());
    }

    let mut filter_hints: Vec<String> = FILTERS
        .iter()
        .filter(|(p, _)| p.is_match(&lower))
        .map(|(_, hint)| hint.to_string())
        .collect();
    for (pattern, label) in VALUE_MENTIONS.iter() {
        if let Some(value) = pattern.captures(question).and_then(|c| c.get(1)) {
            filter_hints.push(format!("{}: {}", label, value.as_str()));
        }
    }
    filter_hints.dedup();
    if !filter_hints.is_empty() {
        reasoning.push(format!("Detected filters: {}", filter_hints.join(", ")));
    }

    let aggregation = AGGREGATIONS
        .iter()
        .find(|(p, _)| p.is_match(&lower))
        .map(|(_, agg)| *agg);
    if let Some(agg) = aggregation {
        if intent == QueryIntent::Select {
            intent = QueryIntent::Aggregation;
        }
        reasoning.push(format!("Aggregation required: {}", agg.as_sql()));
    }

    let group_by = GROUPING.iter().find_map(|pattern| {
        pattern
            .captures_iter(&lower)
            .filter_map(|c| c.get(1))
            .find_map(|m| schema_identifier(m.as_str(), schema))
    });
    if let Some(ident) = &group_by {
        reasoning.push(format!("Results grouped by '{}'", ident));
    }
    let grouping = group_by.is_some();

    let sorting = if DESC_CUES.is_match(&lower) {
        Some(SortOrder::Desc)
    } else if ASC_CUES.is_match(&lower) {
        Some(SortOrder::Asc)
    } else {
        None
    };
    if let Some(order) = sorting {
        reasoning.push(format!("Sort order: {}", order.as_sql()));
    }

    let mut limit = detect_limit(&lower);
    if let Some(n) = limit {
        reasoning.push(format!("Limit to {} rows", n));
    } else if sorting.is_some() && RANKING_WORDS.is_match(&lower) && config.default_limit > 0 {
        limit = Some(config.default_limit);
        reasoning.push(format!("Default limit: {} rows", config.default_limit));
    }

    let distinct = DISTINCT.is_match(&lower);
    if distinct {
        reasoning.push("DISTINCT required".to_string());
    }

    let signals = ComplexitySignals {
        intersection,
        subquery_needed,
        negation,
        needs_join,
        aggregation: aggregation.is_some(),
        grouping,
    };
    let complexity = signals.classify();

    if needs_join {
        reasoning.push("Multiple tables referenced, JOINs will be required".to_string());
    }
    if complexity >= Complexity::Complex {
        reasoning.push(format!(
            "Query complexity: {}, may require subqueries or CTEs",
            complexity.as_str().to_uppercase()
        ));
    }

    tracing::debug!(
        complexity = %complexity,
        needs_join,
        ?aggregation,
        ?limit,
        "Planned question"
    );

    QueryPlan {
        complexity,
        intent,
        tables,
        needs_join,
        aggregation,
        grouping,
        group_by,
        sorting,
        limit,
        distinct,
        negation,
        subquery_needed,
        intersection,
        filter_hints,
        reasoning,
    }
}
