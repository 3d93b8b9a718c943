//! Configuration management.

mod settings;

pub use settings::{
    Settings, SettingsError, DEFAULT_FALLBACK_MODELS, DEFAULT_MODEL, DEFAULT_SYSTEM_MESSAGE,
};
