//! Background worker that drives one turn.
//!
//! A worker owns a [`TurnContext`] by value and a [`TurnTicket`] wrapped in a
//! [`TurnGuard`]. The guard settles the turn exactly once: explicitly on
//! success or backend failure, or from `Drop` if the task is torn down or
//! panics first. Either way `busy` is cleared and History gets an entry.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::messaging::{MessageSender, TurnEvent};
use crate::models::{BackendError, ModelClient};

use super::{ChatMessage, History, SessionState, TurnTicket};

/// Reason recorded when a worker stops without settling its turn.
pub const ABORTED_REASON: &str = "turn aborted before completion";

/// Everything one turn needs, moved into the worker task.
pub struct TurnContext {
    pub text: String,
    pub client: Arc<dyn ModelClient>,
    pub state: SessionState,
    pub history: History,
    pub events: MessageSender,
    /// Pause after each chunk to cap the refresh rate.
    pub chunk_delay: Duration,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(ChatMessage),
    Failed(ChatMessage),
}

impl TurnOutcome {
    /// The message committed to History for this turn.
    pub fn message(&self) -> &ChatMessage {
        match self {
            TurnOutcome::Completed(message) | TurnOutcome::Failed(message) => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TurnOutcome::Completed(_))
    }
}

/// Settles a turn exactly once.
struct TurnGuard {
    ticket: Option<TurnTicket>,
    state: SessionState,
    history: History,
    events: MessageSender,
}

impl TurnGuard {
    fn new(ticket: TurnTicket, state: SessionState, history: History, events: MessageSender) -> Self {
        Self {
            ticket: Some(ticket),
            state,
            history,
            events,
        }
    }

    fn append_chunk(&self, chunk: &str) {
        if let Some(ticket) = &self.ticket {
            self.state.append_chunk(ticket, chunk);
        }
    }

    fn complete(mut self, reply: String) -> ChatMessage {
        let message = ChatMessage::assistant(reply);
        self.settle(message.clone(), false);
        message
    }

    fn fail(mut self, error: impl std::fmt::Display) -> ChatMessage {
        let message = ChatMessage::error(error);
        self.settle(message.clone(), true);
        message
    }

    // History first, then state: a reader that sees `busy == false` finds the
    // message already committed.
    fn settle(&mut self, message: ChatMessage, failed: bool) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        self.history.append(message.clone());
        if failed {
            self.state.fail(ticket, message.text.clone());
            self.events.publish(TurnEvent::Failed { message });
        } else {
            self.state.finish(ticket);
            self.events.publish(TurnEvent::Completed { message });
        }
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if self.ticket.is_some() {
            warn!("Turn dropped before settling; recording failure");
            self.settle(ChatMessage::error(ABORTED_REASON), true);
        }
    }
}

/// Runs one turn against the model backend.
pub struct StreamWorker {
    ctx: TurnContext,
}

impl StreamWorker {
    pub fn new(ctx: TurnContext) -> Self {
        Self { ctx }
    }

    /// Run the turn on a tokio task.
    pub fn spawn(self, ticket: TurnTicket) -> JoinHandle<TurnOutcome> {
        tokio::spawn(self.run(ticket))
    }

    /// Run the turn to completion on the current task.
    pub async fn run(self, ticket: TurnTicket) -> TurnOutcome {
        let TurnContext {
            text,
            client,
            state,
            history,
            events,
            chunk_delay,
        } = self.ctx;

        let turn_id = ticket.turn_id();
        let guard = TurnGuard::new(ticket, state, history, events);
        info!(turn_id, model = %client.model_name(), prompt_len = text.len(), "Turn started");

        match stream_reply(client.as_ref(), &text, &guard, chunk_delay).await {
            Ok(reply) => TurnOutcome::Completed(guard.complete(reply)),
            Err(e) => {
                error!(turn_id, error = %e, "Model backend failed");
                TurnOutcome::Failed(guard.fail(e))
            }
        }
    }
}

async fn stream_reply(
    client: &dyn ModelClient,
    text: &str,
    guard: &TurnGuard,
    chunk_delay: Duration,
) -> Result<String, BackendError> {
    let mut stream = client.stream_chat(text).await?;
    let mut reply = String::new();
    let mut chunk_count = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }

        reply.push_str(&chunk);
        guard.append_chunk(&chunk);
        guard.events.publish(TurnEvent::chunk(chunk));
        chunk_count += 1;

        if chunk_count % 50 == 0 {
            debug!(chunk_count, reply_len = reply.len(), "Streaming");
        }

        if !chunk_delay.is_zero() {
            tokio::time::sleep(chunk_delay).await;
        }
    }

    info!(chunk_count, reply_len = reply.len(), "Reply complete");
    Ok(reply)
}
