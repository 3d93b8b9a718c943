//! Slash-command parsing and the simple command handlers.
//!
//! Handlers that need the coordinator or the network live on
//! [`Repl`](super::Repl); this module keeps parsing and formatting pure.

use crate::models::{ModelInfo, PullProgress};
use crate::session::ChatMessage;

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Models,
    /// `/model` with an optional model name; `None` opens the picker.
    Model(Option<String>),
    Pull(String),
    Delete(String),
    Clear,
    History,
    Context,
    Ping,
    Unknown(String),
    /// A command that needs an argument was given none.
    MissingArg(&'static str),
}

impl Command {
    /// Parse a line starting with `/`.
    pub fn parse(input: &str) -> Self {
        let body = input.trim().trim_start_matches('/');
        let (cmd, args) = match body.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd, args.trim()),
            None => (body, ""),
        };
        let arg = (!args.is_empty()).then(|| args.to_string());

        match cmd.to_lowercase().as_str() {
            "help" | "h" | "?" => Self::Help,
            "exit" | "quit" | "q" => Self::Exit,
            "models" => Self::Models,
            "model" | "m" => Self::Model(arg),
            "pull" => arg.map_or(Self::MissingArg("/pull <model>"), Self::Pull),
            "delete" | "rm" => arg.map_or(Self::MissingArg("/delete <model>"), Self::Delete),
            "clear" | "new" => Self::Clear,
            "history" => Self::History,
            "context" => Self::Context,
            "ping" => Self::Ping,
            other => Self::Unknown(other.to_string()),
        }
    }
}

pub fn show_help() {
    println!(
        "
\x1b[1mCommands\x1b[0m

  \x1b[1;36m/help, /h, /?\x1b[0m          Show this help message
  \x1b[1;36m/exit, /quit, /q\x1b[0m       Exit

\x1b[1mModels:\x1b[0m
  \x1b[1;33m/models\x1b[0m                List installed models
  \x1b[1;33m/model [name]\x1b[0m          Switch model (picker if no name); clears history
  \x1b[1;33m/pull <name>\x1b[0m           Download a model
  \x1b[1;33m/delete <name>\x1b[0m         Delete an installed model
  \x1b[1;33m/ping\x1b[0m                  Check the Ollama connection

\x1b[1mConversation:\x1b[0m
  \x1b[1;35m/history\x1b[0m               Show the conversation with timestamps
  \x1b[1;35m/context\x1b[0m               Show the messages sent to the model
  \x1b[1;35m/clear, /new\x1b[0m           Clear the conversation
"
    );
}

/// Print installed models, marking the active one.
pub fn show_models(models: &[ModelInfo], current: &str) {
    if models.is_empty() {
        println!("No models installed. Use /pull <name> to download one.");
        return;
    }
    println!("\n\x1b[1mInstalled models:\x1b[0m\n");
    for model in models {
        println!("{}", format_model_line(model, current));
    }
    println!();
}

pub fn format_model_line(model: &ModelInfo, current: &str) -> String {
    let marker = if model.name == current { "→ " } else { "  " };
    format!("{}{:<32} {:>9.1} MB", marker, model.name, model.size_mb())
}

/// Single-line pull status, e.g. `downloading 42%`.
pub fn format_pull_progress(progress: &PullProgress) -> String {
    match progress.fraction() {
        Some(fraction) => format!("{} {:.0}%", progress.status, fraction * 100.0),
        None => progress.status.clone(),
    }
}

/// Print the model client's chat context.
pub fn show_context(model: &str, context: &[ChatMessage]) {
    println!(
        "\n\x1b[1mContext for {}\x1b[0m \x1b[2m({} messages)\x1b[0m\n",
        model,
        context.len()
    );
    for message in context {
        println!("  \x1b[2m{:>9}\x1b[0m  {}", message.role.as_str(), first_line(&message.text));
    }
    println!();
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > 72 || text.lines().nth(1).is_some() {
        let cut: String = line.chars().take(72).collect();
        format!("{}…", cut)
    } else {
        line.to_string()
    }
}
