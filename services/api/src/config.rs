//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use study_cards_core::page_key::KeyGranularity;
use study_cards_core::settings::SettingsDefaults;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub storage_path: PathBuf,
    pub model_api_base: String,
    pub model_api_key: Option<String>,
    pub default_model: String,
    pub anki_connect_url: String,
    pub anki_min_version: u32,
    pub default_deck: String,
    /// `None` when the cap is disabled.
    pub max_flashcards: Option<usize>,
    pub highlight_granularity: KeyGranularity,
    pub cleanup_extracted_text: bool,
    pub allowed_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        // --- Server and storage ---
        let bind_address = parse_var("BIND_ADDRESS", &var("BIND_ADDRESS", "127.0.0.1:3000"))?;

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let storage_path = PathBuf::from(var("STORAGE_PATH", "./data/storage.json"));

        // --- Model provider ---
        let model_api_base = var("MODEL_API_BASE", "https://openrouter.ai/api/v1");
        let model_api_key = lookup("MODEL_API_KEY").filter(|k| !k.trim().is_empty());
        let default_model = var("DEFAULT_MODEL", "google/gemini-2.5-pro-exp-03-25:free");

        // --- Flashcard app ---
        let anki_connect_url = var("ANKI_CONNECT_URL", "http://localhost:8765");
        let anki_min_version = parse_var("ANKI_MIN_VERSION", &var("ANKI_MIN_VERSION", "6"))?;
        let default_deck = var("DEFAULT_DECK", "Default");

        // --- Generation behavior ---
        let max_flashcards: usize = parse_var("MAX_FLASHCARDS", &var("MAX_FLASHCARDS", "15"))?;
        let highlight_granularity = var("HIGHLIGHT_GRANULARITY", "page")
            .parse::<KeyGranularity>()
            .map_err(|e| ConfigError::InvalidValue("HIGHLIGHT_GRANULARITY".to_string(), e))?;
        let cleanup_extracted_text =
            parse_bool("CLEANUP_EXTRACTED_TEXT", &var("CLEANUP_EXTRACTED_TEXT", "true"))?;
        let allowed_origin = lookup("ALLOWED_ORIGIN").filter(|o| !o.trim().is_empty());

        Ok(Self {
            bind_address,
            log_level,
            storage_path,
            model_api_base,
            model_api_key,
            default_model,
            anki_connect_url,
            anki_min_version,
            default_deck,
            max_flashcards: (max_flashcards > 0).then_some(max_flashcards),
            highlight_granularity,
            cleanup_extracted_text,
            allowed_origin,
        })
    }

    /// Defaults applied to user settings that have not been set.
    pub fn settings_defaults(&self) -> SettingsDefaults {
        SettingsDefaults {
            api_key: self.model_api_key.clone(),
            model: self.default_model.clone(),
            deck_name: self.default_deck.clone(),
            max_flashcards: self.max_flashcards,
        }
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}
