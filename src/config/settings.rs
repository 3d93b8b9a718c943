//! Runtime settings.
//!
//! Values come from command-line flags or `QUANTY_*` environment variables
//! (see `main.rs`); this module holds the resolved result and checks it.

use std::time::Duration;

use thiserror::Error;

use crate::models::DEFAULT_OLLAMA_URL;
use crate::session::DEFAULT_CHUNK_DELAY;

pub const DEFAULT_MODEL: &str = "gemma2:2b";
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &["gemma:7b", "llama2:7b", "mistral:7b"];
pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are a helpful assistant that can answer questions and help with tasks.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Model name is empty")]
    EmptyModel,
    #[error("Invalid Ollama URL {0:?}: expected http:// or https://")]
    InvalidUrl(String),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    /// Preferred model at startup.
    pub model: String,
    /// Tried in order when `model` is not installed.
    pub fallback_models: Vec<String>,
    /// Sent as the first message of every chat request.
    pub system_message: String,
    /// Pause after each streamed chunk.
    pub chunk_delay: Duration,
    /// How often the REPL samples the session while a reply streams.
    pub poll_interval: Duration,
    /// Upper bound on establishing a connection to the server. Replies may
    /// stream for as long as the model keeps producing them.
    pub connect_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            fallback_models: DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            chunk_delay: DEFAULT_CHUNK_DELAY,
            poll_interval: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Check the settings, normalizing the URL and model name.
    pub fn validate(mut self) -> Result<Self, SettingsError> {
        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            return Err(SettingsError::EmptyModel);
        }

        let url = self.ollama_url.trim().trim_end_matches('/');
        let has_host = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(SettingsError::InvalidUrl(self.ollama_url));
        }
        self.ollama_url = url.to_string();

        if self.poll_interval.is_zero() {
            return Err(SettingsError::ZeroDuration("poll interval"));
        }
        if self.connect_timeout.is_zero() {
            return Err(SettingsError::ZeroDuration("connect timeout"));
        }

        self.fallback_models.retain(|m| !m.trim().is_empty());
        Ok(self)
    }
}
