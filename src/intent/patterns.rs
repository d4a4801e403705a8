//! Static pattern registry shared by the detectors and the error classifier.
//!
//! Everything here is compiled once on first use and never mutated.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::correction::ErrorKind;

/// Kind of vagueness an ambiguous term introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityCategory {
    Temporal,
    Ranking,
    Quantity,
    Comparison,
    Size,
    Status,
}

/// Clarification priority tier. `High` sorts before `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
}

impl AmbiguityCategory {
    pub fn priority(self) -> Priority {
        match self {
            Self::Temporal | Self::Ranking => Priority::High,
            _ => Priority::Normal,
        }
    }
}

/// A registry entry: the term, its candidate resolutions and the
/// clarification template (`{options}` is replaced by the joined candidates).
#[derive(Debug)]
pub struct AmbiguousTerm {
    pub term: &'static str,
    pub category: AmbiguityCategory,
    pub options: &'static [&'static str],
    pub template: &'static str,
}

impl AmbiguousTerm {
    pub fn prompt(&self) -> String {
        self.template.replace("{options}", &self.options.join(", "))
    }
}

use AmbiguityCategory::*;

pub static AMBIGUOUS_TERMS: &[AmbiguousTerm] = &[
    AmbiguousTerm {
        term: "top",
        category: Ranking,
        options: &["highest value", "most frequent", "most recent", "highest rated"],
        template: "When you say 'top', do you mean by {options}?",
    },
    AmbiguousTerm {
        term: "best",
        category: Ranking,
        options: &["highest rating", "highest revenue", "most popular", "highest quantity"],
        template: "What defines 'best' in this context? ({options})",
    },
    AmbiguousTerm {
        term: "highest",
        category: Ranking,
        options: &["maximum value", "maximum count", "highest total"],
        template: "When you say 'highest', do you mean {options}?",
    },
    AmbiguousTerm {
        term: "lowest",
        category: Ranking,
        options: &["minimum value", "minimum count", "lowest total"],
        template: "When you say 'lowest', do you mean {options}?",
    },
    AmbiguousTerm {
        term: "most",
        category: Ranking,
        options: &["highest count", "highest value", "most frequent"],
        template: "'Most' could mean different things. Do you mean {options}?",
    },
    AmbiguousTerm {
        term: "least",
        category: Ranking,
        options: &["lowest count", "lowest value", "least frequent"],
        template: "When you say 'least', what measure are you referring to? ({options})",
    },
    AmbiguousTerm {
        term: "latest",
        category: Temporal,
        options: &["most recent date", "last inserted record", "newest entry"],
        template: "When you say 'latest', do you mean {options}?",
    },
    AmbiguousTerm {
        term: "recent",
        category: Temporal,
        options: &["last 7 days", "last 30 days", "last quarter", "last year"],
        template: "How recent? ({options})",
    },
    AmbiguousTerm {
        term: "old",
        category: Temporal,
        options: &["oldest by date", "created longest ago", "first entries"],
        template: "When you say 'old', do you mean {options}?",
    },
    AmbiguousTerm {
        term: "few",
        category: Quantity,
        options: &["less than 5", "less than 10", "bottom 10%"],
        template: "How many would you consider 'few'? ({options})",
    },
    AmbiguousTerm {
        term: "many",
        category: Quantity,
        options: &["more than 10", "more than 50", "top 10%"],
        template: "How many would you consider 'many'? ({options})",
    },
    AmbiguousTerm {
        term: "some",
        category: Quantity,
        options: &["approximately 5", "approximately 10", "a sample"],
        template: "Could you specify a rough number for 'some'? ({options})",
    },
    AmbiguousTerm {
        term: "better",
        category: Comparison,
        options: &["higher rating", "higher sales", "better performance"],
        template: "Better in what way? ({options})",
    },
    AmbiguousTerm {
        term: "worse",
        category: Comparison,
        options: &["lower rating", "lower sales", "worse performance"],
        template: "Worse in what way? ({options})",
    },
    AmbiguousTerm {
        term: "similar",
        category: Comparison,
        options: &["same category", "similar value range", "related items"],
        template: "Similar based on what criteria? ({options})",
    },
    AmbiguousTerm {
        term: "large",
        category: Size,
        options: &["above average size", "top 25%", "larger than threshold"],
        template: "How would you define 'large'? ({options})",
    },
    AmbiguousTerm {
        term: "small",
        category: Size,
        options: &["below average size", "bottom 25%", "smaller than threshold"],
        template: "How would you define 'small'? ({options})",
    },
    AmbiguousTerm {
        term: "significant",
        category: Size,
        options: &["statistically significant", "above average", "notable difference"],
        template: "What would be considered 'significant'? ({options})",
    },
    AmbiguousTerm {
        term: "active",
        category: Status,
        options: &["currently active status", "has recent activity", "not archived"],
        template: "What defines 'active' in this context? ({options})",
    },
    AmbiguousTerm {
        term: "popular",
        category: Status,
        options: &["most viewed", "most purchased", "highest rated", "trending"],
        template: "Popular by what measure? ({options})",
    },
];

/// One word-boundary, case-insensitive matcher per registry term, in
/// registry order.
pub static TERM_MATCHERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    AMBIGUOUS_TERMS
        .iter()
        .map(|t| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(t.term))).unwrap())
        .collect()
});

// Disambiguation guards. All are matched against lowercased text.

/// A number immediately after the term ("top 5", "recent 3").
pub static ATTACHED_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+\d+\b").unwrap());

/// "how" immediately before the term ("how many", "how old").
pub static INTERROGATIVE_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bhow\s+$").unwrap());

/// Explicit time windows and calendar periods.
pub static TIME_WINDOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \b\d+\s+(?:hour|day|week|month|quarter|year)s?\b
        | \b(?:last|past|previous|this|current|next)\s+(?:hour|day|week|month|quarter|year)\b
        | \b(?:19|20)\d{2}\b
        | \b(?:today|yesterday)\b
        ",
    )
    .unwrap()
});

/// Explicit row counts ("first 10", "limit 20", "15 results", "5 most").
pub static ROW_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \b(?:top|first|last|bottom|limit)\s+\d+\b
        | \b\d+\s+(?:results?|rows?|records?|entries|items)\b
        | \b\d+\s+(?:most|least|best|highest|lowest|latest|top)\b
        ",
    )
    .unwrap()
});

/// Numeric comparisons ("more than 50", "at least 3", "over 100").
pub static NUMERIC_COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:more|less|fewer|greater|higher|lower|over|under|above|below|at\s+least|at\s+most|exceeding)\s+(?:than\s+)?\$?\d+",
    )
    .unwrap()
});

/// An explicit measure right after a ranking term
/// ("top customers by revenue", "most orders per country").
pub static MEASURE_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(?:\w+\s+){1,2}?(?:by|per|in\s+terms\s+of)\s+\w+").unwrap()
});

/// Kind of schema-introspection question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaKind {
    ListTables,
    DescribeTable,
    TableRows,
    DescribeAll,
    Relationships,
}

/// Conversational turns answered without touching the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Greeting,
    Help,
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
}

/// Phrasings for meta-queries without a target, in detection order.
pub static META_PHRASINGS: LazyLock<Vec<(MetaKind, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            MetaKind::ListTables,
            compile_all(&[
                r"\bwhat tables\b",
                r"\bwhich tables\b",
                r"\blist\b.*\btables\b",
                r"\bshow\b.*\btables\b",
                r"\ball tables\b",
                r"\btables in\b.*\bdatabase\b",
                r"\bdatabase tables\b",
                r"\bavailable tables\b",
            ]),
        ),
        (
            MetaKind::TableRows,
            compile_all(&[
                r"\bwhich table\b.*\bmost (?:rows|records|data)\b",
                r"\blargest table\b",
                r"\bbiggest table\b",
                r"\btable\b.*\bmost (?:rows|records|data)\b",
                r"\bmost populated table\b",
            ]),
        ),
        (
            MetaKind::DescribeAll,
            compile_all(&[
                r"\bfull schema\b",
                r"\bentire schema\b",
                r"\bcomplete schema\b",
                r"\ball columns\b",
                r"\bdatabase structure\b",
                r"\bschema overview\b",
                r"\bdescribe\b.*\bdatabase\b",
                r"\bwhat is this (?:dataset|database)\b",
                r"\bexplain this (?:dataset|database)\b",
                r"\bsummary of (?:the )?data\b",
                r"\btell me about (?:the|this) (?:data|dataset|database)\b",
            ]),
        ),
        (
            MetaKind::Relationships,
            compile_all(&[
                r"\brelationships\b",
                r"\bforeign keys?\b",
                r"\bhow\b.*\btables\b.*\bconnected\b",
                r"\btable connections\b",
                r"\blinks between\b",
            ]),
        ),
    ]
});

/// Whole-question chat phrasings. Anchored so "help me find ..." or
/// "hi, how many tracks ..." still reach the query path.
pub static CHAT_PHRASINGS: LazyLock<Vec<(ChatKind, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            ChatKind::Greeting,
            compile_all(&[
                r"^(?:hi|hello|hey|greetings|good (?:morning|afternoon|evening))(?: there)?[\s!.,]*$",
            ]),
        ),
        (
            ChatKind::Help,
            compile_all(&[
                r"^(?:help|help me)[\s!.?]*$",
                r"^what can you do[\s!.?]*$",
                r"^how (?:do i|to) use (?:this|you)[\s!.?]*$",
                r"^what are your capabilities[\s!.?]*$",
            ]),
        ),
    ]
});

/// Describe-table phrasings; capture group 1 is the target table.
pub static DESCRIBE_TABLE_PHRASINGS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"\bschema of (?:the )?(\w+)",
        r"\bdescribe (?:the )?(\w+)",
        r"\bstructure of (?:the )?(\w+)",
        r"\bcolumns (?:in|of) (?:the )?(\w+)",
        r"\bwhat\b.*\bin (?:the )?(\w+) table\b",
        r"\b(\w+) table schema\b",
        r"\b(\w+) table structure\b",
        r"\bshow (?:me )?(?:the )?(\w+) table\b",
        r"\bwhat does (?:the )?(\w+) table contain\b",
        r"\bfields (?:in|of) (?:the )?(\w+)",
    ])
});

/// Words a describe phrasing can capture that never name a table.
pub const META_STOPWORDS: &[&str] = &["the", "a", "an", "this", "that", "all", "each", "me"];

/// Error signatures in match order: specific signatures precede the generic
/// ones they overlap with. Capture group 1, when present, is the offending
/// identifier or token.
pub static ERROR_SIGNATURES: LazyLock<Vec<(ErrorKind, Regex)>> = LazyLock::new(|| {
    let sig = |kind, pattern: &str| (kind, Regex::new(&format!("(?i){}", pattern)).unwrap());
    vec![
        sig(ErrorKind::ColumnNotFound, r"no such column:\s*([\w.]+)"),
        sig(ErrorKind::ColumnNotFound, r#"column "?([\w.]+)"? does not exist"#),
        sig(ErrorKind::ColumnNotFound, r"unknown column '([\w.]+)'"),
        sig(ErrorKind::TableNotFound, r"no such table:\s*([\w.]+)"),
        sig(ErrorKind::TableNotFound, r#"relation "?([\w.]+)"? does not exist"#),
        sig(ErrorKind::AmbiguousColumn, r"ambiguous column name:\s*([\w.]+)"),
        sig(ErrorKind::AmbiguousColumn, r#"column reference "?([\w.]+)"? is ambiguous"#),
        sig(
            ErrorKind::ReservedWordCollision,
            r#"near ['"](order|group|primary|table|index|key|values|default|check|references|column|transaction|desc|asc)['"]:?\s*syntax error"#,
        ),
        sig(ErrorKind::SyntaxNearKeyword, r#"near ['"]([^'"]+)['"]:?\s*syntax error"#),
        sig(ErrorKind::SyntaxError, r"syntax error|incomplete input|unrecognized token"),
        sig(ErrorKind::UniqueViolation, r"unique constraint failed"),
        sig(
            ErrorKind::GroupByRequired,
            r"group by clause|must appear in the group by|not in aggregate function",
        ),
        sig(ErrorKind::AggregateError, r"misuse of aggregate(?: function)?:?\s*(\w+)?|aggregate"),
        sig(ErrorKind::TypeMismatch, r"datatype mismatch|type mismatch|invalid input syntax for type"),
        sig(ErrorKind::FunctionNotFound, r"no such function:\s*(\w+)"),
        sig(ErrorKind::FunctionNotFound, r"function (\w+)\(.*\) does not exist"),
    ]
});
