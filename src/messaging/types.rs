//! Turn lifecycle events.

use serde::{Deserialize, Serialize};

use crate::session::ChatMessage;

/// Message levels for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

/// Events published while a turn runs.
///
/// Each event is sent after the mutation it describes, so a subscriber that
/// sees `Completed` or `Failed` can read History and find the message there.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A turn was accepted for the given user text.
    Started { text: String },
    /// A non-empty chunk was appended to the partial reply.
    Chunk { text: String },
    /// The reply was committed to History.
    Completed { message: ChatMessage },
    /// The turn failed; `message` is the error entry committed to History.
    Failed { message: ChatMessage },
    /// History was cleared (model switch or explicit clear).
    HistoryCleared,
}

impl TurnEvent {
    /// Create a started event.
    pub fn started(text: impl Into<String>) -> Self {
        Self::Started { text: text.into() }
    }

    /// Create a chunk event.
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { text: text.into() }
    }

    /// True for the events that end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}
