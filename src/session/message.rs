//! Conversation messages.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Prefix put in front of backend failures recorded as assistant messages.
pub const ERROR_PREFIX: &str = "Error: ";

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message.
///
/// Messages are created once and never edited; the streaming text of an
/// in-flight reply lives in [`SessionState`](super::SessionState) until the
/// turn settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub text: String,
    pub created_at: DateTime<Local>,
}

impl ChatMessage {
    fn new(role: MessageRole, text: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text,
            created_at: Local::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text.into())
    }

    /// An assistant message describing a failed turn.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::new(MessageRole::Assistant, format!("{ERROR_PREFIX}{message}"))
    }

    /// Wall-clock creation time as `HH:MM:SS`.
    pub fn timestamp(&self) -> String {
        self.created_at.format("%H:%M:%S").to_string()
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn is_error(&self) -> bool {
        self.role == MessageRole::Assistant && self.text.starts_with(ERROR_PREFIX)
    }
}
