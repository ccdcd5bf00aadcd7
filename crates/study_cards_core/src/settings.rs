//! crates/study_cards_core/src/settings.rs
//!
//! User preferences and the last-generated flashcard set, both persisted in the
//! key-value store. Preferences have an explicit load/update lifecycle; nothing holds
//! the API key in mutable global state.

use chrono::Utc;
use futures::lock::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::{Flashcard, ModelCredentials, SavedFlashcardSet, SettingsPatch, UserSettings};
use crate::ports::{KeyValueStore, PortError, PortResult};

pub const SETTINGS_KEY: &str = "settings";
pub const LAST_FLASHCARDS_KEY: &str = "lastFlashcards";

/// Values used when the user has not chosen their own.
#[derive(Debug, Clone)]
pub struct SettingsDefaults {
    pub api_key: Option<String>,
    pub model: String,
    pub deck_name: String,
    pub max_flashcards: Option<usize>,
}

/// Effective preferences as shown to the UI. The key itself never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub has_api_key: bool,
    pub model: String,
    pub deck_name: String,
    /// `None` when the cap is disabled.
    pub max_flashcards: Option<usize>,
}

pub struct SettingsStore {
    storage: Arc<dyn KeyValueStore>,
    defaults: SettingsDefaults,
    write_queue: Mutex<()>,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, defaults: SettingsDefaults) -> Self {
        Self {
            storage,
            defaults,
            write_queue: Mutex::new(()),
        }
    }

    pub async fn load(&self) -> PortResult<UserSettings> {
        match self.storage.get(SETTINGS_KEY).await? {
            None | Some(Value::Null) => Ok(UserSettings::default()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| PortError::Storage(format!("corrupt settings: {}", e))),
        }
    }

    pub async fn update(&self, patch: SettingsPatch) -> PortResult<UserSettings> {
        let _guard = self.write_queue.lock().await;
        let mut settings = self.load().await?;

        if let Some(api_key) = patch.api_key {
            settings.api_key = non_blank(api_key);
        }
        if let Some(model) = patch.model {
            settings.model = non_blank(model);
        }
        if let Some(deck) = patch.deck_name {
            settings.deck_name = non_blank(deck);
        }
        if let Some(max) = patch.max_flashcards {
            settings.max_flashcards = Some(max);
        }

        let value = serde_json::to_value(&settings).map_err(|e| PortError::Storage(e.to_string()))?;
        self.storage.set(SETTINGS_KEY, value).await?;
        Ok(settings)
    }

    /// The key and model to use for the next request. A stored key wins over the
    /// configured fallback; a missing key is an input error.
    pub async fn credentials(&self) -> PortResult<ModelCredentials> {
        let settings = self.load().await?;
        let api_key = settings
            .api_key
            .or_else(|| self.defaults.api_key.clone())
            .ok_or_else(|| PortError::InvalidInput("Please enter your API key".to_string()))?;
        Ok(ModelCredentials {
            api_key,
            model: settings.model.unwrap_or_else(|| self.defaults.model.clone()),
        })
    }

    pub async fn deck_name(&self) -> PortResult<String> {
        Ok(self
            .load()
            .await?
            .deck_name
            .unwrap_or_else(|| self.defaults.deck_name.clone()))
    }

    /// The effective card cap; zero means unlimited.
    pub async fn max_flashcards(&self) -> PortResult<Option<usize>> {
        let stored = self.load().await?.max_flashcards;
        Ok(stored.or(self.defaults.max_flashcards).filter(|&n| n > 0))
    }

    pub async fn view(&self) -> PortResult<SettingsView> {
        Ok(self.view_of(self.load().await?))
    }

    pub fn view_of(&self, settings: UserSettings) -> SettingsView {
        SettingsView {
            has_api_key: settings.api_key.is_some() || self.defaults.api_key.is_some(),
            model: settings.model.unwrap_or_else(|| self.defaults.model.clone()),
            deck_name: settings
                .deck_name
                .unwrap_or_else(|| self.defaults.deck_name.clone()),
            max_flashcards: settings
                .max_flashcards
                .or(self.defaults.max_flashcards)
                .filter(|&n| n > 0),
        }
    }
}

/// The single slot holding the most recent generation.
pub struct LastFlashcards {
    storage: Arc<dyn KeyValueStore>,
}

impl LastFlashcards {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Overwrites the slot.
    pub async fn save(&self, title: &str, url: &str, flashcards: &[Flashcard]) -> PortResult<SavedFlashcardSet> {
        let set = SavedFlashcardSet {
            title: title.to_string(),
            url: url.to_string(),
            created_at: Utc::now(),
            flashcards: flashcards.to_vec(),
        };
        let value = serde_json::to_value(&set).map_err(|e| PortError::Storage(e.to_string()))?;
        self.storage.set(LAST_FLASHCARDS_KEY, value).await?;
        Ok(set)
    }

    /// The saved set, only if it was generated for `url`.
    pub async fn load_for(&self, url: &str) -> PortResult<Option<SavedFlashcardSet>> {
        let Some(value) = self.storage.get(LAST_FLASHCARDS_KEY).await? else {
            return Ok(None);
        };
        let set: SavedFlashcardSet = serde_json::from_value(value)
            .map_err(|e| PortError::Storage(format!("corrupt flashcard cache: {}", e)))?;
        Ok((set.url == url).then_some(set))
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
