//! Model access.
//!
//! This module handles:
//! - The [`ModelClient`] seam the turn worker streams replies through
//! - The Ollama chat client and its NDJSON framing
//! - Model administration (list, pull, delete, switch)

mod client;
mod manager;
mod ndjson;
mod ollama;

pub use client::{BackendError, ChunkStream, ModelClient};
pub use manager::{ModelInfo, ModelManager, ModelManagerError, PullProgress};
pub use ndjson::LineBuffer;
pub use ollama::{OllamaClient, DEFAULT_OLLAMA_URL};
