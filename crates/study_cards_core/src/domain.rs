//! crates/study_cards_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs carry serde derives because they are persisted verbatim in the
//! key-value store and exchanged with the browser extension as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user-selected passage of text saved for later flashcard generation.
///
/// Highlights are never mutated after creation; they are only added or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    /// Creation timestamp in milliseconds, unique within a store.
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    // Older layouts stored the creation time under `timestamp`.
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// The caller-supplied part of a highlight, before the store assigns identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightDraft {
    pub content: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Result of adding a highlight: the saved record and the new count for its page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub saved: Highlight,
    pub page_count: usize,
}

/// Result of removing a highlight by id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOutcome {
    pub removed: bool,
    pub by_page: BTreeMap<String, Vec<Highlight>>,
}

/// The full contents of the store plus a flattened view.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightListing {
    pub by_page: BTreeMap<String, Vec<Highlight>>,
    pub all: Vec<Highlight>,
}

/// A single question/answer pair.
///
/// Fields are public so the UI can replace `front`/`back` in place on an existing card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

impl Flashcard {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }
}

/// The last generated set of cards, kept in a single slot so the user can reopen it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFlashcardSet {
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub flashcards: Vec<Flashcard>,
}

/// Persisted user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub deck_name: Option<String>,
    /// `Some(0)` explicitly disables the card cap.
    #[serde(default)]
    pub max_flashcards: Option<usize>,
}

/// A partial update to `UserSettings`. Absent fields are left untouched;
/// an empty string clears a stored string value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub deck_name: Option<String>,
    pub max_flashcards: Option<usize>,
}

/// Everything needed to authenticate a single model request.
#[derive(Clone)]
pub struct ModelCredentials {
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for ModelCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCredentials")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}
