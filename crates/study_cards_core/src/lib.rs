pub mod badge;
pub mod content;
pub mod domain;
pub mod export;
pub mod highlights;
pub mod memory_store;
pub mod page_key;
pub mod parser;
pub mod pipeline;
pub mod ports;
pub mod prompt;
pub mod settings;
pub mod sink;

pub use badge::{badge_for_count, BadgeReconciler, BadgeState};
pub use content::ExtractedPage;
pub use domain::{
    AddOutcome, Flashcard, Highlight, HighlightDraft, HighlightListing, ModelCredentials,
    RemoveOutcome, SavedFlashcardSet, SettingsPatch, UserSettings,
};
pub use highlights::{HighlightQuery, HighlightStore, OpenOutcome};
pub use memory_store::MemoryStore;
pub use page_key::{KeyGranularity, PageKey, PageKeyResolver};
pub use parser::{parse_reply, ParseFailure, ResponseFormat};
pub use pipeline::{FlashcardPipeline, GenerationOptions};
pub use ports::{FlashcardSink, KeyValueStore, LanguageModelService, PortError, PortResult};
pub use settings::{LastFlashcards, SettingsDefaults, SettingsStore, SettingsView};
pub use sink::{deliver, DeliveryReport};
