//! Ordered, append-only record of the decisions made for one turn.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStep {
    Analyze,
    Ambiguity,
    Merge,
    Schema,
    Relationships,
    Planning,
    Complexity,
    Generation,
    Validation,
    Execution,
    Retry,
    Fix,
    Regenerate,
    Answer,
    Done,
    Failed,
}

impl TraceStep {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Analyze => "🔍",
            Self::Ambiguity => "⚠️",
            Self::Merge => "📝",
            Self::Schema => "📊",
            Self::Relationships => "🔗",
            Self::Planning => "📈",
            Self::Complexity => "🎯",
            Self::Generation => "⚙️",
            Self::Validation => "🔒",
            Self::Execution => "🚀",
            Self::Retry => "🔄",
            Self::Fix => "🔧",
            Self::Regenerate => "🤖",
            Self::Answer => "💬",
            Self::Done => "✅",
            Self::Failed => "❌",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Complete,
    Retry,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub step: TraceStep,
    pub icon: &'static str,
    pub description: String,
    pub status: TraceStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub turn_id: Uuid,
    entries: Vec<TraceEntry>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

impl Trace {
    pub fn new() -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, step: TraceStep, description: impl Into<String>, status: TraceStatus) {
        let description = description.into();
        tracing::debug!(
            turn_id = %self.turn_id,
            step = ?step,
            status = ?status,
            "{}",
            description
        );
        self.entries.push(TraceEntry {
            step,
            icon: step.icon(),
            description,
            status,
        });
    }

    pub fn complete(&mut self, step: TraceStep, description: impl Into<String>) {
        self.push(step, description, TraceStatus::Complete);
    }

    pub fn retry(&mut self, step: TraceStep, description: impl Into<String>) {
        self.push(step, description, TraceStatus::Retry);
    }

    pub fn error(&mut self, step: TraceStep, description: impl Into<String>) {
        self.push(step, description, TraceStatus::Error);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn steps(&self) -> Vec<TraceStep> {
        self.entries.iter().map(|e| e.step).collect()
    }

    pub fn contains(&self, step: TraceStep) -> bool {
        self.entries.iter().any(|e| e.step == step)
    }

    /// One line per entry: `icon description`
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} {}", e.icon, e.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_ordered() {
        let mut trace = Trace::new();
        trace.complete(TraceStep::Analyze, "Analyzing question");
        trace.retry(TraceStep::Retry, "Retrying");
        trace.error(TraceStep::Failed, "Gave up");

        assert_eq!(
            trace.steps(),
            vec![TraceStep::Analyze, TraceStep::Retry, TraceStep::Failed]
        );
        assert_eq!(trace.entries()[1].status, TraceStatus::Retry);
        assert_eq!(trace.entries()[2].icon, "❌");
        assert_eq!(trace.render().lines().next(), Some("🔍 Analyzing question"));
    }

    #[test]
    fn test_serializes_snake_case() {
        let mut trace = Trace::new();
        trace.complete(TraceStep::Generation, "Generated query");
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["entries"][0]["step"], "generation");
        assert_eq!(json["entries"][0]["status"], "complete");
        assert_eq!(json["entries"][0]["icon"], "⚙️");
    }
}
