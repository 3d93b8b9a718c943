//! Interactive REPL implementation.

use std::io::{stdout, Write};
use std::sync::Arc;

use reedline::Signal;
use tracing::{debug, warn};

use crate::cli::commands::{self, Command};
use crate::cli::completion::{create_reedline, QuantyCompleter, QuantyPrompt};
use crate::cli::model_picker::pick_model;
use crate::cli::presenter::TurnPresenter;
use crate::config::Settings;
use crate::messaging::{MessageLevel, TerminalRenderer};
use crate::models::{ModelInfo, ModelManager};
use crate::session::{TurnCoordinator, TurnError};

/// REPL state.
pub struct Repl {
    manager: ModelManager,
    coordinator: TurnCoordinator,
    presenter: TurnPresenter,
    renderer: TerminalRenderer,
    /// Installed models as of the last listing, for completion.
    models: Vec<ModelInfo>,
}

impl Repl {
    pub fn new(settings: &Settings, manager: ModelManager) -> Self {
        let coordinator = TurnCoordinator::new(Arc::new(manager.client()))
            .with_chunk_delay(settings.chunk_delay);
        Self {
            manager,
            coordinator,
            presenter: TurnPresenter::new(settings.poll_interval),
            renderer: TerminalRenderer::new(),
            models: Vec::new(),
        }
    }

    /// Seed the model list used for completion.
    pub fn with_models(mut self, models: Vec<ModelInfo>) -> Self {
        self.models = models;
        self
    }

    pub fn coordinator(&self) -> &TurnCoordinator {
        &self.coordinator
    }

    /// Run the REPL loop.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut completer = QuantyCompleter::new();
        completer.set_models(self.models.iter().map(|m| m.name.clone()).collect());
        let mut line_editor = create_reedline(completer);

        loop {
            let prompt = QuantyPrompt::new(self.manager.current_model());

            match line_editor.read_line(&prompt) {
                Ok(Signal::Success(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match self.handle_input(line).await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => {
                            let _ = self
                                .renderer
                                .render_notice(MessageLevel::Error, &e.to_string());
                        }
                    }
                }
                Ok(Signal::CtrlC) => {
                    println!("^C");
                    continue;
                }
                Ok(Signal::CtrlD) => break,
                Err(err) => {
                    let _ = self
                        .renderer
                        .render_notice(MessageLevel::Error, &format!("Readline error: {}", err));
                    break;
                }
            }
        }

        println!("Bye!");
        Ok(())
    }

    /// Handle one line of input. Returns `true` when the REPL should exit.
    pub async fn handle_input(&mut self, input: &str) -> anyhow::Result<bool> {
        if input.starts_with('/') {
            return self.handle_command(Command::parse(input)).await;
        }
        self.handle_prompt(input).await?;
        Ok(false)
    }

    /// Send one message and stream the reply. Returns whether it succeeded.
    pub async fn handle_prompt(&mut self, prompt: &str) -> anyhow::Result<bool> {
        debug!(prompt_len = prompt.len(), "Submitting turn");
        self.presenter.present(&self.coordinator, prompt).await
    }

    async fn handle_command(&mut self, command: Command) -> anyhow::Result<bool> {
        match command {
            Command::Help => commands::show_help(),
            Command::Exit => return Ok(true),
            Command::Models => {
                self.refresh_models().await?;
                commands::show_models(&self.models, self.manager.current_model());
            }
            Command::Model(Some(name)) => self.switch_model(&name).await?,
            Command::Model(None) => {
                self.refresh_models().await?;
                if let Some(name) = pick_model(&self.models, self.manager.current_model()) {
                    self.switch_model(&name).await?;
                }
            }
            Command::Pull(name) => self.cmd_pull(&name).await?,
            Command::Delete(name) => {
                self.manager.delete_model(&name).await?;
                self.renderer
                    .render_notice(MessageLevel::Success, &format!("Deleted {}", name))?;
                self.models.retain(|m| m.name != name);
            }
            Command::Clear => {
                self.manager.reset_conversation(&self.coordinator)?;
                self.renderer
                    .render_notice(MessageLevel::Success, "Conversation cleared")?;
            }
            Command::History => self.renderer.render_history(&self.coordinator.history())?,
            Command::Context => {
                let client = self.coordinator.client();
                commands::show_context(client.model_name(), &client.history());
            }
            Command::Ping => {
                let version = self.manager.check_connection().await?;
                self.renderer.render_notice(
                    MessageLevel::Success,
                    &format!("Ollama {} at {}", version, self.manager.base_url()),
                )?;
            }
            Command::MissingArg(usage) => {
                self.renderer
                    .render_notice(MessageLevel::Warning, &format!("Usage: {}", usage))?;
            }
            Command::Unknown(cmd) => {
                self.renderer.render_notice(
                    MessageLevel::Warning,
                    &format!("Unknown command: /{} (type /help)", cmd),
                )?;
            }
        }
        Ok(false)
    }

    async fn refresh_models(&mut self) -> anyhow::Result<()> {
        self.models = self.manager.list_models().await?;
        Ok(())
    }

    async fn switch_model(&mut self, name: &str) -> anyhow::Result<()> {
        if !self.models.is_empty() && !self.models.iter().any(|m| m.name == name) {
            warn!(model = %name, "Switching to a model that is not in the last listing");
        }
        match self.manager.switch_model(name, &self.coordinator) {
            Ok(true) => self.renderer.render_notice(
                MessageLevel::Success,
                &format!("Switched to {} (history cleared)", name),
            )?,
            Ok(false) => self
                .renderer
                .render_notice(MessageLevel::Info, &format!("Already using {}", name))?,
            Err(TurnError::AlreadyBusy) => self.renderer.render_notice(
                MessageLevel::Warning,
                "Wait for the current reply before switching models",
            )?,
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn cmd_pull(&mut self, name: &str) -> anyhow::Result<()> {
        let mut last_line = String::new();
        let result = self
            .manager
            .pull_model(name, |progress| {
                let line = commands::format_pull_progress(progress);
                if line != last_line {
                    print!("\r\x1b[2K{}", line);
                    let _ = stdout().flush();
                    last_line = line;
                }
            })
            .await;
        println!();
        result?;

        self.renderer
            .render_notice(MessageLevel::Success, &format!("Pulled {}", name))?;
        self.refresh_models().await
    }
}
