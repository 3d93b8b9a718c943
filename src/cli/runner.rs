//! CLI runner for interactive, single-prompt and check modes.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cli::presenter::TurnPresenter;
use crate::cli::repl::Repl;
use crate::config::Settings;
use crate::messaging::{BusError, MessageReceiver, TurnEvent};
use crate::models::{ModelInfo, ModelManager};
use crate::session::TurnCoordinator;

/// Connect to Ollama and settle on a startup model.
///
/// An unreachable server is not fatal here: the first turn reports it.
async fn prepare(settings: &Settings) -> (ModelManager, Vec<ModelInfo>) {
    let probe = ModelManager::new(settings);
    let models = match probe.list_models().await {
        Ok(models) => models,
        Err(e) => {
            warn!(error = %e, url = %settings.ollama_url, "Could not list models");
            Vec::new()
        }
    };

    let model =
        ModelManager::pick_startup_model(&settings.model, &settings.fallback_models, &models);
    let settings = Settings {
        model,
        ..settings.clone()
    };
    (ModelManager::new(&settings), models)
}

/// Log every turn event at debug level.
async fn log_events(mut receiver: MessageReceiver) {
    loop {
        match receiver.recv().await {
            Ok(TurnEvent::Chunk { text }) => debug!(len = text.len(), "turn chunk"),
            Ok(event) => debug!(?event, "turn event"),
            Err(BusError::Lagged(n)) => debug!(skipped = n, "event log lagged"),
            Err(BusError::Closed) => break,
        }
    }
}

/// Run a single prompt and exit.
///
/// Returns whether the turn produced a reply.
pub async fn run_single_prompt(settings: &Settings, prompt: &str) -> anyhow::Result<bool> {
    let (manager, _) = prepare(settings).await;
    let coordinator = TurnCoordinator::new(Arc::new(manager.client()))
        .with_chunk_delay(settings.chunk_delay);
    tokio::spawn(log_events(coordinator.subscribe()));

    TurnPresenter::new(settings.poll_interval)
        .without_spinner()
        .present(&coordinator, prompt)
        .await
}

/// Run in interactive mode.
pub async fn run_interactive(settings: &Settings) -> anyhow::Result<()> {
    print_banner();

    let (manager, models) = prepare(settings).await;
    if models.is_empty() {
        println!(
            "  \x1b[33mNo models found at {}. Is Ollama running?\x1b[0m\n",
            settings.ollama_url
        );
    }

    let mut repl = Repl::new(settings, manager).with_models(models);
    tokio::spawn(log_events(repl.coordinator().subscribe()));
    repl.run().await
}

/// Check the connection and list models, then exit.
pub async fn run_check(settings: &Settings) -> anyhow::Result<()> {
    let manager = ModelManager::new(settings);
    let version = manager.check_connection().await?;
    println!("Ollama {} at {}", version, manager.base_url());

    let models = manager.list_models().await?;
    let picked =
        ModelManager::pick_startup_model(&settings.model, &settings.fallback_models, &models);
    println!("{} model(s) installed; would start with {}", models.len(), picked);
    Ok(())
}

/// Print the welcome banner.
pub fn print_banner() {
    println!();
    println!(
        "  \x1b[1;33mquanty\x1b[0m  \x1b[2mv{}\x1b[0m",
        get_version()
    );
    println!("  \x1b[2mChat with local models through Ollama\x1b[0m");
    println!("  \x1b[2mType \x1b[0m\x1b[1;36m/help\x1b[0m\x1b[2m for commands, or start chatting!\x1b[0m");
    println!();
}

/// Get the application version string.
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
