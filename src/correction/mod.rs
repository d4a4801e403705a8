//! Failure classification and the bounded self-correction loop.

pub mod classifier;
pub mod fixes;
pub mod orchestrator;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use classifier::classify;
pub use fixes::{apply_fix, DeterministicFix};
pub use orchestrator::{
    AttemptOutcome, AttemptStage, CorrectionOutcome, CorrectionReport, CorrectionState,
    ExecutionAttempt, RetryDirective, RetryPolicy, SelfCorrection,
};

/// Closed taxonomy of pipeline failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AmbiguousInput,
    MetaQuery,
    ValidationRejected,
    ColumnNotFound,
    TableNotFound,
    AmbiguousColumn,
    SyntaxError,
    SyntaxNearKeyword,
    ReservedWordCollision,
    UniqueViolation,
    GroupByRequired,
    AggregateError,
    TypeMismatch,
    FunctionNotFound,
    JoinRelationshipMissing,
    GenerationTimeout,
    ExecutionTimeout,
    GenerationFailed,
    RetriesExhausted,
    EmptyResult,
    Unrecognized,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmbiguousInput => "ambiguous_input",
            Self::MetaQuery => "meta_query",
            Self::ValidationRejected => "validation_rejected",
            Self::ColumnNotFound => "column_not_found",
            Self::TableNotFound => "table_not_found",
            Self::AmbiguousColumn => "ambiguous_column",
            Self::SyntaxError => "syntax_error",
            Self::SyntaxNearKeyword => "syntax_near_keyword",
            Self::ReservedWordCollision => "reserved_word_collision",
            Self::UniqueViolation => "unique_violation",
            Self::GroupByRequired => "group_by_required",
            Self::AggregateError => "aggregate_error",
            Self::TypeMismatch => "type_mismatch",
            Self::FunctionNotFound => "function_not_found",
            Self::JoinRelationshipMissing => "join_relationship_missing",
            Self::GenerationTimeout => "generation_timeout",
            Self::ExecutionTimeout => "execution_timeout",
            Self::GenerationFailed => "generation_failed",
            Self::RetriesExhausted => "retries_exhausted",
            Self::EmptyResult => "empty_result",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one failure. Built fresh for every failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    /// Offending identifier or token captured from the error text
    pub fragment: Option<String>,
    /// One-line analysis of what went wrong
    pub analysis: String,
    pub fix_hint: Option<String>,
    pub requires_join: bool,
    pub join_table: Option<String>,
    pub join_column: Option<String>,
    /// `(old, new)` identifier pair for rename fixes
    pub replacement: Option<(String, String)>,
    pub fix: Option<DeterministicFix>,
}

impl ErrorClassification {
    pub fn new(kind: ErrorKind, analysis: impl Into<String>) -> Self {
        Self {
            kind,
            fragment: None,
            analysis: analysis.into(),
            fix_hint: None,
            requires_join: false,
            join_table: None,
            join_column: None,
            replacement: None,
            fix: None,
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    pub fn with_fix(mut self, fix: DeterministicFix) -> Self {
        if let DeterministicFix::Rename { from, to } = &fix {
            self.replacement = Some((from.clone(), to.clone()));
        }
        self.fix = Some(fix);
        self
    }

    pub fn can_apply_deterministic_fix(&self) -> bool {
        self.fix.is_some()
    }

    pub fn validation_rejected(reason: &str) -> Self {
        Self::new(ErrorKind::ValidationRejected, format!("Query rejected: {}", reason))
            .with_hint("Generate a single read-only SELECT statement without comments")
    }

    pub fn generation_timeout(limit_ms: u64) -> Self {
        Self::new(
            ErrorKind::GenerationTimeout,
            format!("Query generation did not finish within {}ms", limit_ms),
        )
        .with_hint("Generate a simpler query")
    }

    pub fn execution_timeout(limit_ms: u64) -> Self {
        Self::new(
            ErrorKind::ExecutionTimeout,
            format!("Query execution did not finish within {}ms", limit_ms),
        )
        .with_hint("Reduce the amount of work: filter earlier, avoid cross joins, add a LIMIT")
    }

    pub fn generation_failed(detail: &str) -> Self {
        Self::new(
            ErrorKind::GenerationFailed,
            format!("The generator returned no usable query: {}", detail),
        )
        .with_hint("Answer with a REASONING section followed by a SQL section")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::JoinRelationshipMissing).unwrap();
        assert_eq!(json, "\"join_relationship_missing\"");
        assert_eq!(ErrorKind::SyntaxNearKeyword.to_string(), "syntax_near_keyword");
    }

    #[test]
    fn test_rename_fix_sets_replacement() {
        let c = ErrorClassification::new(ErrorKind::ColumnNotFound, "x").with_fix(
            DeterministicFix::Rename {
                from: "Nmae".into(),
                to: "Name".into(),
            },
        );
        assert!(c.can_apply_deterministic_fix());
        assert_eq!(c.replacement, Some(("Nmae".into(), "Name".into())));
    }
}
