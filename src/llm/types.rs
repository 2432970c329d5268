//! Message types for oracle communication

use serde::{Deserialize, Serialize};

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system instruction message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Build the standard two-message exchange: one system instruction plus one user turn
pub fn instruction(system: impl Into<String>, user: impl Into<String>) -> Vec<Message> {
    vec![Message::system(system), Message::user(user)]
}

/// Split a message list into (system prompt, conversational messages)
///
/// Multiple system messages are joined with a blank line.
pub fn split_system(messages: &[Message]) -> (String, Vec<&Message>) {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let rest = messages.iter().filter(|m| m.role != Role::System).collect();
    (system, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::System).unwrap();
        assert_eq!(json, "\"system\"");
        let role: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(role, Role::Assistant);
    }

    #[test]
    fn test_instruction_shape() {
        let messages = instruction("rules", "do the thing");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].content, "do the thing");
    }

    #[test]
    fn test_split_system() {
        let messages = vec![
            Message::system("first"),
            Message::user("hello"),
            Message::system("second"),
        ];
        let (system, rest) = split_system(&messages);
        assert_eq!(system, "first\n\nsecond");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].content, "hello");
    }
}
