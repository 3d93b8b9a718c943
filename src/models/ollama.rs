//! Ollama chat client.
//!
//! Streams replies from `POST /api/chat` and keeps the running conversation
//! (system message plus completed turns) so each request carries the full
//! context. A turn is added to the context only once its reply completes;
//! failed turns leave it untouched.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::session::{ChatMessage, MessageRole};

use super::client::{BackendError, ChunkStream, ModelClient};
use super::ndjson::LineBuffer;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

/// One decoded line of a chat stream.
#[derive(Debug, PartialEq)]
enum ChatFrame {
    Chunk(String),
    Done(String),
}

fn parse_chat_line(line: &str) -> Result<ChatFrame, BackendError> {
    let parsed: ChatLine = serde_json::from_str(line)?;
    if let Some(error) = parsed.error {
        return Err(BackendError::Model(error));
    }
    let content = parsed.message.map(|m| m.content).unwrap_or_default();
    if parsed.done {
        Ok(ChatFrame::Done(content))
    } else {
        Ok(ChatFrame::Chunk(content))
    }
}

/// Chat client for one Ollama model.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    system_message: String,
    context: Arc<Mutex<Vec<ChatMessage>>>,
}

impl OllamaClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        system_message: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            system_message: system_message.into(),
            context: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn context(&self) -> Vec<ChatMessage> {
        self.context
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream_chat(&self, text: &str) -> Result<ChunkStream, BackendError> {
        let prior = self.context();
        let mut messages = Vec::with_capacity(prior.len() + 2);
        if !self.system_message.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: &self.system_message,
            });
        }
        messages.extend(prior.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.text,
        }));
        messages.push(WireMessage {
            role: MessageRole::User.as_str(),
            content: text,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        debug!(model = %self.model, context_len = prior.len(), "Sending chat request");
        let response = self
            .http
            .post(self.chat_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes_stream()
            .map(|r| r.map(|b| b.to_vec()))
            .boxed();
        let decoder = ChatStreamDecoder::new(bytes, self.context.clone(), ChatMessage::user(text));

        Ok(futures::stream::unfold(decoder, |mut decoder| async move {
            decoder.next_item().await.map(|item| (item, decoder))
        })
        .boxed())
    }

    fn history(&self) -> Vec<ChatMessage> {
        self.context()
    }
}

/// Turns a raw byte stream into reply chunks and records the finished turn.
struct ChatStreamDecoder {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    lines: LineBuffer,
    pending: VecDeque<Result<String, BackendError>>,
    reply: String,
    finished: bool,
    context: Arc<Mutex<Vec<ChatMessage>>>,
    user: Option<ChatMessage>,
}

impl ChatStreamDecoder {
    fn new(
        bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
        context: Arc<Mutex<Vec<ChatMessage>>>,
        user: ChatMessage,
    ) -> Self {
        Self {
            bytes,
            lines: LineBuffer::new(),
            pending: VecDeque::new(),
            reply: String::new(),
            finished: false,
            context,
            user: Some(user),
        }
    }

    async fn next_item(&mut self) -> Option<Result<String, BackendError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.bytes.next().await {
                Some(Ok(bytes)) => {
                    for line in self.lines.push(&bytes) {
                        self.handle_line(&line);
                    }
                }
                Some(Err(e)) => self.fail(e.into()),
                None => {
                    if let Some(line) = self.lines.finish() {
                        self.handle_line(&line);
                    }
                    if !self.finished {
                        warn!("Chat stream closed without a done marker");
                        self.fail(BackendError::Aborted);
                    }
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        if self.finished {
            return;
        }
        match parse_chat_line(line) {
            Ok(ChatFrame::Chunk(text)) => {
                self.reply.push_str(&text);
                self.pending.push_back(Ok(text));
            }
            Ok(ChatFrame::Done(text)) => {
                if !text.is_empty() {
                    self.reply.push_str(&text);
                    self.pending.push_back(Ok(text));
                }
                self.finished = true;
                self.commit();
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: BackendError) {
        self.finished = true;
        self.pending.push_back(Err(error));
    }

    fn commit(&mut self) {
        if let Some(user) = self.user.take() {
            let mut context = self.context.lock().unwrap_or_else(|e| e.into_inner());
            context.push(user);
            context.push(ChatMessage::assistant(std::mem::take(&mut self.reply)));
        }
    }
}
