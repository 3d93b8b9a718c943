//! Reedline line editor: slash-command completion, prompt and highlighting.
//!
//! Type "/" then Tab to see commands. Menu filters as you type.

use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, Emacs, Highlighter, KeyCode, KeyModifiers, MenuBuilder, Prompt,
    PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline, ReedlineEvent,
    ReedlineMenu, Span, StyledText, Suggestion,
};
use std::borrow::Cow;

/// All slash commands with descriptions
pub const COMMANDS: &[(&str, &str)] = &[
    ("/clear", "Clear conversation history"),
    ("/context", "Show the model's chat context"),
    ("/delete", "Delete an installed model"),
    ("/exit", "Exit"),
    ("/help", "Show help"),
    ("/history", "Show conversation history"),
    ("/model", "Switch model"),
    ("/models", "List installed models"),
    ("/ping", "Check the Ollama connection"),
    ("/pull", "Download a model"),
    ("/quit", "Exit"),
];

/// Commands whose argument is a model name.
const MODEL_ARG_COMMANDS: &[&str] = &["/model ", "/delete "];

/// Completer for slash commands and installed model names.
#[derive(Clone, Default)]
pub struct QuantyCompleter {
    pub models: Vec<String>,
}

impl QuantyCompleter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_models(&mut self, models: Vec<String>) {
        self.models = models;
    }
}

impl Completer for QuantyCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if pos > line.len() {
            return Vec::new();
        }

        let input = &line[..pos];

        if input.is_empty() || !input.starts_with('/') {
            return Vec::new();
        }

        if !input.contains(' ') {
            let prefix = input.to_lowercase();
            return COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(&prefix))
                .map(|(cmd, desc)| Suggestion {
                    value: cmd.to_string(),
                    description: Some(desc.to_string()),
                    extra: None,
                    span: Span::new(0, pos),
                    append_whitespace: true,
                    style: None,
                })
                .collect();
        }

        if MODEL_ARG_COMMANDS.iter().any(|c| input.starts_with(c)) {
            let prefix = input.split_whitespace().nth(1).unwrap_or("").to_lowercase();
            let start = input.find(' ').map(|i| i + 1).unwrap_or(pos);
            return self
                .models
                .iter()
                .filter(|m| prefix.is_empty() || m.to_lowercase().starts_with(&prefix))
                .take(12)
                .map(|m| Suggestion {
                    value: m.clone(),
                    description: None,
                    extra: None,
                    span: Span::new(start, pos),
                    append_whitespace: false,
                    style: None,
                })
                .collect();
        }

        Vec::new()
    }
}

/// Prompt showing the active model.
pub struct QuantyPrompt {
    pub model_name: String,
}

impl QuantyPrompt {
    pub fn new(model: &str) -> Self {
        Self {
            model_name: model.to_string(),
        }
    }
}

impl Prompt for QuantyPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(format!("\x1b[2m[{}]\x1b[0m", self.model_name))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed(" › ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(&self, hs: PromptHistorySearch) -> Cow<'_, str> {
        let prefix = match hs.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}search: {}) ", prefix, hs.term))
    }
}

/// Highlights known slash commands in cyan, unknown ones in yellow.
#[derive(Clone)]
pub struct QuantyHighlighter;

impl Highlighter for QuantyHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();

        if line.starts_with('/') {
            let cmd_end = line.find(' ').unwrap_or(line.len());
            let cmd = &line[..cmd_end];
            let style = if COMMANDS.iter().any(|(c, _)| *c == cmd) {
                Style::new().fg(Color::Cyan).bold()
            } else {
                Style::new().fg(Color::Yellow)
            };
            styled.push((style, cmd.to_string()));

            if cmd_end < line.len() {
                styled.push((Style::default(), line[cmd_end..].to_string()));
            }
        } else {
            styled.push((Style::default(), line.to_string()));
        }

        styled
    }
}

/// Create reedline with Tab-triggered completion menu
pub fn create_reedline(completer: QuantyCompleter) -> Reedline {
    let completion_menu = Box::new(
        ColumnarMenu::default()
            .with_name("completion_menu")
            .with_columns(1)
            .with_column_padding(2)
            .with_text_style(Style::new().fg(Color::Default))
            .with_selected_text_style(Style::new().fg(Color::Black).on(Color::Cyan))
            .with_description_text_style(Style::new().fg(Color::DarkGray)),
    );

    let mut keybindings = reedline::default_emacs_keybindings();

    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );
    keybindings.add_binding(
        KeyModifiers::SHIFT,
        KeyCode::BackTab,
        ReedlineEvent::MenuPrevious,
    );

    Reedline::create()
        .with_completer(Box::new(completer))
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_quick_completions(true)
        .with_partial_completions(true)
        .with_highlighter(Box::new(QuantyHighlighter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(suggestions: Vec<Suggestion>) -> Vec<String> {
        suggestions.into_iter().map(|s| s.value).collect()
    }

    // =========================================================================
    // Completer Tests
    // =========================================================================

    #[test]
    fn test_complete_command_prefix() {
        let mut completer = QuantyCompleter::new();
        let got = values(completer.complete("/mo", 3));
        assert_eq!(got, vec!["/model", "/models"]);
    }

    #[test]
    fn test_complete_ignores_plain_text() {
        let mut completer = QuantyCompleter::new();
        assert!(completer.complete("hello", 5).is_empty());
        assert!(completer.complete("", 0).is_empty());
    }

    #[test]
    fn test_complete_model_argument() {
        let mut completer = QuantyCompleter::new();
        completer.set_models(vec![
            "gemma2:2b".into(),
            "gemma:7b".into(),
            "llama2:7b".into(),
        ]);

        let suggestions = completer.complete("/model gem", 10);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].span, Span::new(7, 10));

        let got = values(completer.complete("/delete ", 8));
        assert_eq!(got.len(), 3);
    }

    #[test]
    fn test_complete_pos_out_of_range() {
        let mut completer = QuantyCompleter::new();
        assert!(completer.complete("/h", 10).is_empty());
    }

    // =========================================================================
    // Prompt & Highlighter Tests
    // =========================================================================

    #[test]
    fn test_prompt_shows_model() {
        let prompt = QuantyPrompt::new("gemma2:2b");
        assert!(prompt.render_prompt_left().contains("gemma2:2b"));
        assert_eq!(prompt.render_prompt_right(), "");
    }

    #[test]
    fn test_highlighter_styles_known_command() {
        let styled = QuantyHighlighter.highlight("/models extra", 0);
        assert_eq!(styled.buffer.len(), 2);
        assert_eq!(styled.buffer[0].0, Style::new().fg(Color::Cyan).bold());
        assert_eq!(styled.buffer[0].1, "/models");
        assert_eq!(styled.buffer[1].1, " extra");
    }

    #[test]
    fn test_highlighter_unknown_command() {
        let styled = QuantyHighlighter.highlight("/nope", 0);
        assert_eq!(styled.buffer[0].0, Style::new().fg(Color::Yellow));
    }

    #[test]
    fn test_highlighter_plain_text() {
        let styled = QuantyHighlighter.highlight("hello", 0);
        assert_eq!(styled.buffer.len(), 1);
        assert_eq!(styled.buffer[0].0, Style::default());
    }
}
