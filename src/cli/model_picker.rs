//! Interactive model selection using dialoguer.

use dialoguer::{theme::ColorfulTheme, FuzzySelect};

use crate::models::ModelInfo;

/// Show a fuzzy-search picker over installed models.
///
/// Returns `None` when the list is empty or the user cancels.
pub fn pick_model(models: &[ModelInfo], current: &str) -> Option<String> {
    if models.is_empty() {
        println!("No models installed. Use /pull <name> to download one.");
        return None;
    }

    let names: Vec<String> = models.iter().map(|m| m.name.clone()).collect();
    let display: Vec<String> = names
        .iter()
        .map(|m| format_model_display(m, current))
        .collect();

    let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Select model (type to filter)")
        .items(&display)
        .default(find_default_model_index(&names, current))
        .interact_opt();

    match selection {
        Ok(Some(idx)) => names.get(idx).cloned(),
        _ => None,
    }
}

/// Format a model name for display with optional "(current)" marker.
pub fn format_model_display(model_name: &str, current: &str) -> String {
    if model_name == current {
        format!("{} (current)", model_name)
    } else {
        model_name.to_string()
    }
}

/// Find the default index for a model in a list.
pub fn find_default_model_index(models: &[String], current: &str) -> usize {
    models.iter().position(|m| m == current).unwrap_or(0)
}
