//! Scripted model client for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Notify;

use crate::models::{BackendError, ChunkStream, ModelClient};

use super::ChatMessage;

#[derive(Debug, Clone)]
enum Step {
    Chunk(String),
    Fail(String),
    Panic,
}

/// Replays a fixed chunk sequence, optionally failing, panicking, or waiting
/// on a gate before the first chunk.
pub struct ScriptedClient {
    name: String,
    steps: Vec<Step>,
    fail_on_start: Option<String>,
    gate: Option<Arc<Notify>>,
    calls: Arc<AtomicUsize>,
    prompts: Mutex<Vec<ChatMessage>>,
}

impl ScriptedClient {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "scripted".to_string(),
            steps: chunks.into_iter().map(|c| Step::Chunk(c.into())).collect(),
            fail_on_start: None,
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Fail with `message` after the scripted chunks.
    pub fn failing_after(mut self, message: &str) -> Self {
        self.steps.push(Step::Fail(message.to_string()));
        self
    }

    /// Fail before returning a stream.
    pub fn failing_immediately(mut self, message: &str) -> Self {
        self.fail_on_start = Some(message.to_string());
        self
    }

    /// Panic after the scripted chunks.
    pub fn panicking(mut self) -> Self {
        self.steps.push(Step::Panic);
        self
    }

    /// Hold the stream until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Shared counter of `stream_chat` calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(&self, text: &str) -> Result<ChunkStream, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ChatMessage::user(text));

        if let Some(message) = &self.fail_on_start {
            return Err(BackendError::Model(message.clone()));
        }

        let steps = self.steps.clone();
        let gate = self.gate.clone();
        let stream = futures::stream::once(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
        })
        .map(move |_| {
            futures::stream::iter(steps.clone().into_iter().map(|step| match step {
                Step::Chunk(text) => Ok(text),
                Step::Fail(message) => Err(BackendError::Model(message)),
                Step::Panic => panic!("scripted backend panic"),
            }))
        })
        .flatten();

        Ok(stream.boxed())
    }

    fn history(&self) -> Vec<ChatMessage> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
