//! CLI components.

pub mod commands;
pub mod completion;
pub mod model_picker;
pub mod presenter;
pub mod repl;
pub mod runner;

pub use completion::{create_reedline, QuantyCompleter, QuantyPrompt, COMMANDS};
pub use model_picker::pick_model;
pub use presenter::{unseen_suffix, TurnPresenter};
pub use repl::Repl;
pub use runner::{run_check, run_interactive, run_single_prompt};
