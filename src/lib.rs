//! quanty library
//!
//! Streams replies from a local language model into a terminal chat, one turn
//! at a time.
//!
//! ## Main Components
//!
//! - [`session`] - Turn coordination (History, SessionState, StreamWorker, TurnCoordinator)
//! - [`models`] - Model client seam, Ollama client and model management
//! - [`messaging`] - Turn events, terminal rendering, spinner
//! - [`config`] - Runtime settings
//! - [`cli`] - REPL, presenter and runners
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use quanty::{ModelManager, Settings, TurnCoordinator};
//!
//! let settings = Settings::default().validate()?;
//! let manager = ModelManager::new(&settings);
//! let coordinator = TurnCoordinator::new(Arc::new(manager.client()));
//! let handle = coordinator.submit("Why is the sky blue?")?;
//! let outcome = handle.wait().await;
//! ```

pub mod cli;
pub mod config;
pub mod messaging;
pub mod models;
pub mod session;

pub use config::{Settings, SettingsError};
pub use messaging::{MessageBus, MessageReceiver, TerminalRenderer, TurnEvent};
pub use models::{BackendError, ModelClient, ModelManager, ModelManagerError, OllamaClient};
pub use session::{
    ChatMessage, History, MessageRole, SessionSnapshot, SessionState, TurnCoordinator, TurnError,
    TurnOutcome,
};
