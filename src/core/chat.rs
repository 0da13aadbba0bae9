use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    Ai,
    User,
}

/// An entry of the chat transcript. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new<S: Into<String>>(role: ChatRole, text: S) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only chat history of a workspace session
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn push(&mut self, role: ChatRole, text: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage::new(role, text));
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages. Only called on explicit user request.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
