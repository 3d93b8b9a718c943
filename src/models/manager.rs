//! Model management against a local Ollama server.
//!
//! Tracks the active model, builds chat clients for it, and wraps the
//! model-administration endpoints (list, pull, delete, version).

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::session::{TurnCoordinator, TurnError};

use super::ndjson::LineBuffer;
use super::ollama::OllamaClient;

#[derive(Debug, Error)]
pub enum ModelManagerError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Pull failed: {0}")]
    Pull(String),
    #[error("Cannot delete the active model: {0}")]
    ActiveModel(String),
    #[error("Model name is empty")]
    EmptyName,
}

/// An installed model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: Option<String>,
}

impl ModelInfo {
    /// Size in mebibytes.
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Debug, Serialize)]
struct ModelRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Progress update while pulling a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullProgress {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct PullLine {
    #[serde(flatten)]
    progress: PullProgress,
    #[serde(default)]
    error: Option<String>,
}

impl PullProgress {
    /// Completed fraction in `0.0..=1.0`, when the server reports sizes.
    pub fn fraction(&self) -> Option<f64> {
        match (self.completed, self.total) {
            (Some(done), Some(total)) if total > 0 => Some((done as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Owns the HTTP client and the active model name.
pub struct ModelManager {
    http: reqwest::Client,
    base_url: String,
    system_message: String,
    current_model: String,
}

impl ModelManager {
    pub fn new(settings: &Settings) -> Self {
        // No total timeout: a reply streams for as long as the model runs.
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            http,
            base_url: settings.ollama_url.trim_end_matches('/').to_string(),
            system_message: settings.system_message.clone(),
            current_model: settings.model.clone(),
        }
    }

    pub fn current_model(&self) -> &str {
        &self.current_model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A fresh chat client for the active model.
    pub fn client(&self) -> OllamaClient {
        self.client_for(&self.current_model)
    }

    /// A fresh chat client bound to `model`, with empty context.
    pub fn client_for(&self, model: &str) -> OllamaClient {
        OllamaClient::new(
            self.http.clone(),
            self.base_url.clone(),
            model,
            self.system_message.clone(),
        )
    }

    /// Make `model` active.
    ///
    /// Clears the coordinator's History and hands it a new client. Returns
    /// `Ok(false)` when `model` is already active.
    pub fn switch_model(
        &mut self,
        model: &str,
        coordinator: &TurnCoordinator,
    ) -> Result<bool, TurnError> {
        if model == self.current_model {
            return Ok(false);
        }
        coordinator.switch_model(Arc::new(self.client_for(model)))?;
        info!(from = %self.current_model, to = %model, "Active model changed");
        self.current_model = model.to_string();
        Ok(true)
    }

    /// Clear History and start the active model on an empty context.
    pub fn reset_conversation(&self, coordinator: &TurnCoordinator) -> Result<(), TurnError> {
        coordinator.switch_model(Arc::new(self.client()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ModelManagerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        Err(ModelManagerError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Server version, doubling as a connection check.
    pub async fn check_connection(&self) -> Result<String, ModelManagerError> {
        let response = self
            .http
            .get(self.url("/api/version"))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let version: VersionResponse = serde_json::from_str(&response.text().await?)?;
        debug!(version = %version.version, "Ollama reachable");
        Ok(version.version)
    }

    /// Installed models, sorted by name.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ModelManagerError> {
        let response = self
            .http
            .get(self.url("/api/tags"))
            .timeout(Duration::from_secs(15))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let mut tags: TagsResponse = serde_json::from_str(&response.text().await?)?;
        tags.models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags.models)
    }

    /// Download `model`, reporting each progress line.
    pub async fn pull_model(
        &self,
        model: &str,
        mut progress: impl FnMut(&PullProgress),
    ) -> Result<(), ModelManagerError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(ModelManagerError::EmptyName);
        }

        info!(%model, "Pulling model");
        let response = self
            .http
            .post(self.url("/api/pull"))
            .json(&ModelRequest {
                model,
                stream: Some(true),
            })
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let mut bytes = response.bytes_stream();
        let mut lines = LineBuffer::new();
        let mut succeeded = false;

        while let Some(chunk) = bytes.next().await {
            for line in lines.push(&chunk?) {
                succeeded |= handle_pull_line(&line, &mut progress)?;
            }
        }
        if let Some(line) = lines.finish() {
            succeeded |= handle_pull_line(&line, &mut progress)?;
        }

        if succeeded {
            Ok(())
        } else {
            Err(ModelManagerError::Pull(
                "stream ended without success".to_string(),
            ))
        }
    }

    /// Remove an installed model. The active model cannot be deleted.
    pub async fn delete_model(&self, model: &str) -> Result<(), ModelManagerError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(ModelManagerError::EmptyName);
        }
        if model == self.current_model {
            return Err(ModelManagerError::ActiveModel(model.to_string()));
        }

        let response = self
            .http
            .delete(self.url("/api/delete"))
            .json(&ModelRequest {
                model,
                stream: None,
            })
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        Self::check_status(response).await?;
        info!(%model, "Deleted model");
        Ok(())
    }

    /// Choose the model to start with.
    ///
    /// The preferred model wins if installed, then the first installed
    /// fallback. With nothing matching (or an empty list) the preferred name
    /// is kept so the first turn reports the real error.
    pub fn pick_startup_model(preferred: &str, fallbacks: &[String], available: &[ModelInfo]) -> String {
        let installed = |name: &str| available.iter().any(|m| m.name == name);

        if available.is_empty() || installed(preferred) {
            return preferred.to_string();
        }
        match fallbacks.iter().find(|f| installed(f)) {
            Some(fallback) => {
                warn!(%preferred, %fallback, "Preferred model not installed; using fallback");
                fallback.clone()
            }
            None => preferred.to_string(),
        }
    }
}

fn handle_pull_line(
    line: &str,
    progress: &mut impl FnMut(&PullProgress),
) -> Result<bool, ModelManagerError> {
    let parsed: PullLine = serde_json::from_str(line)?;
    if let Some(error) = parsed.error {
        return Err(ModelManagerError::Pull(error));
    }
    progress(&parsed.progress);
    Ok(parsed.progress.is_success())
}
