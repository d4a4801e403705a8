//! Question understanding: ambiguity, clarification merging, meta-queries
//! and query planning.

pub mod ambiguity;
pub mod chat;
pub mod merger;
pub mod meta_query;
pub mod patterns;
pub mod planner;

use serde::{Deserialize, Serialize};

pub use ambiguity::{detect, AmbiguityFinding};
pub use chat::detect_chat;
pub use merger::merge;
pub use meta_query::{detect_meta, MetaAnswer, MetaQuery, MetaTable};
pub use patterns::{AmbiguityCategory, ChatKind, MetaKind, Priority};
pub use planner::{plan, Aggregation, Complexity, PlannerConfig, QueryIntent, QueryPlan, SortOrder};

/// A user question. `original` is what was typed; `resolved` is the text
/// after any clarification merge. A merge produces a new `Question`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    original: String,
    resolved: String,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            original: text.clone(),
            resolved: text,
        }
    }

    /// Text the rest of the pipeline works on.
    pub fn text(&self) -> &str {
        &self.resolved
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn is_merged(&self) -> bool {
        self.original != self.resolved
    }

    pub(crate) fn resolve(self, resolved: String) -> Self {
        Self {
            original: self.original,
            resolved,
        }
    }
}

/// A paused turn waiting for the user's clarification reply. Holding one in
/// the session means a clarification is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationState {
    pub question: Question,
    pub finding: AmbiguityFinding,
}

impl ClarificationState {
    pub fn new(question: Question, finding: AmbiguityFinding) -> Self {
        Self { question, finding }
    }
}
