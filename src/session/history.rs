//! Append-only log of completed turns.

use std::sync::{Arc, RwLock};

use super::ChatMessage;

/// Ordered conversation log.
///
/// Cloning a `History` yields another handle onto the same log. Readers always
/// get a defensive copy, so iterating a snapshot never races a writer.
#[derive(Debug, Clone, Default)]
pub struct History {
    messages: Arc<RwLock<Vec<ChatMessage>>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the end of the log.
    pub fn append(&self, message: ChatMessage) {
        let mut messages = self.messages.write().unwrap_or_else(|e| e.into_inner());
        messages.push(message);
    }

    /// Copy of all messages in conversation order.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Most recent message, if any.
    pub fn last(&self) -> Option<ChatMessage> {
        self.messages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.messages.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every message.
    ///
    /// Callers must make sure no turn is in flight;
    /// [`TurnCoordinator::clear_history`](super::TurnCoordinator::clear_history)
    /// does that check.
    pub fn clear(&self) {
        self.messages
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
