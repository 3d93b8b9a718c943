//! Model client abstraction.
//!
//! The stream worker only talks to a backend through [`ModelClient`]; the
//! Ollama implementation lives in [`super::ollama`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::session::ChatMessage;

/// Lazy, finite, non-restartable sequence of reply chunks.
pub type ChunkStream = BoxStream<'static, Result<String, BackendError>>;

/// Failures surfaced by a model backend while producing a reply.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Model(String),
    #[error("Stream ended before the reply was complete")]
    Aborted,
}

/// A chat backend bound to one model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Name of the model this client talks to.
    fn model_name(&self) -> &str;

    /// Send `text` as the next user turn and stream the reply.
    ///
    /// Prior turns are the client's business; it may fail before returning
    /// the stream or from inside it.
    async fn stream_chat(&self, text: &str) -> Result<ChunkStream, BackendError>;

    /// Conversation context held by the client, oldest first.
    fn history(&self) -> Vec<ChatMessage>;
}
