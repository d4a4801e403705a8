//! Conversational context: prefix stripping and prompt context.

use super::session::{ConversationMemory, Role};

/// Marker clients put between conversation context and the current question.
pub const CURRENT_QUESTION_MARKER: &str = "Current question:";

/// The current turn's question without any conversation-context prefix.
pub fn strip_context(text: &str) -> &str {
    match text.rfind(CURRENT_QUESTION_MARKER) {
        Some(pos) => text[pos + CURRENT_QUESTION_MARKER.len()..].trim(),
        None => text.trim(),
    }
}

/// `User:` / `System:` lines for the last `turns` exchanges, oldest first.
pub fn build_context(memory: &ConversationMemory, turns: usize) -> Option<String> {
    if turns == 0 {
        return None;
    }
    let lines: Vec<String> = memory
        .recent(turns * 2)
        .filter(|m| !m.content.is_empty())
        .map(|m| {
            let prefix = match m.role {
                Role::User => "User",
                Role::System => "System",
            };
            format!("{}: {}", prefix, m.content)
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
