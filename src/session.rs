//! Conversation history consumed by the extractor
//!
//! The pipeline only reads a session. The interactive CLI owns an `InMemorySession` and
//! appends to it after each exchange.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::llm::Role;

/// Turns retained by `InMemorySession` unless configured otherwise
pub const DEFAULT_SESSION_CAPACITY: usize = 20;

/// One past exchange line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Read-only view of a conversation
pub trait SessionHistory: Send + Sync {
    /// Up to `limit` most recent turns, oldest first
    fn recent_turns(&self, limit: usize) -> Vec<ConversationTurn>;

    /// Free-text notes the user asked to keep
    fn user_notes(&self) -> Option<String>;
}

/// Bounded in-memory session
#[derive(Debug, Clone)]
pub struct InMemorySession {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
    notes: Option<String>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SESSION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.set_notes(notes);
        self
    }

    /// Replace the notes; blank text clears them
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        let notes = notes.into();
        self.notes = (!notes.trim().is_empty()).then_some(notes);
    }

    /// Append a turn, evicting the oldest one at capacity
    pub fn push_turn(&mut self, turn: ConversationTurn) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Record a user utterance and the reply it produced
    pub fn record_exchange(&mut self, utterance: impl Into<String>, reply: impl Into<String>) {
        self.push_turn(ConversationTurn::user(utterance));
        self.push_turn(ConversationTurn::assistant(reply));
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHistory for InMemorySession {
    fn recent_turns(&self, limit: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(limit);
        self.turns.iter().skip(skip).cloned().collect()
    }

    fn user_notes(&self) -> Option<String> {
        self.notes.clone()
    }
}
