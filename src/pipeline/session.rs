//! Per-conversation state owned by the caller between turns.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::ClarificationState;
use crate::schema::SchemaView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Bounded message history; the oldest messages are dropped first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMemory {
    messages: VecDeque<MemoryMessage>,
    /// Maximum number of exchanges (user + system pairs) kept
    capacity: usize,
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity,
        }
    }

    fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push_back(MemoryMessage {
            role,
            content: content.into(),
            at: Utc::now(),
        });
        while self.messages.len() > self.capacity * 2 {
            self.messages.pop_front();
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content);
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.push(Role::System, content);
    }

    /// Last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &MemoryMessage> {
        self.messages.iter().skip(self.messages.len().saturating_sub(n))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// State of one conversation. Sessions are independent of each other and
/// share only the immutable schema.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    pub schema: Arc<SchemaView>,
    /// Present while a clarification reply is awaited
    pub clarification: Option<ClarificationState>,
    pub memory: ConversationMemory,
    pub created_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(schema: Arc<SchemaView>, memory_turns: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            schema,
            clarification: None,
            memory: ConversationMemory::new(memory_turns),
            created_at: Utc::now(),
        }
    }

    pub fn awaiting_clarification(&self) -> bool {
        self.clarification.is_some()
    }

    /// Forget history and any pending clarification.
    pub fn reset(&mut self) {
        self.clarification = None;
        self.memory.clear();
    }
}
