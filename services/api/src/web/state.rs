//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::tabs::TabRegistry;
use std::sync::Arc;
use study_cards_core::{
    highlights::OpenOutcome,
    ports::{FlashcardSink, KeyValueStore, LanguageModelService, PortResult},
    BadgeReconciler, FlashcardPipeline, HighlightStore, LastFlashcards, PageKeyResolver,
    SettingsStore,
};
use tracing::info;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub highlights: Arc<HighlightStore>,
    pub badge: Arc<BadgeReconciler>,
    pub settings: Arc<SettingsStore>,
    pub last_flashcards: Arc<LastFlashcards>,
    pub pipeline: Arc<FlashcardPipeline>,
    pub sink: Arc<dyn FlashcardSink>,
    pub tabs: Arc<TabRegistry>,
}

impl AppState {
    /// Builds the state on top of the given adapters and brings the highlight store
    /// up to the current layout before any request is served.
    pub async fn new(
        config: Arc<Config>,
        storage: Arc<dyn KeyValueStore>,
        model: Arc<dyn LanguageModelService>,
        sink: Arc<dyn FlashcardSink>,
    ) -> PortResult<Self> {
        let resolver = PageKeyResolver::new(config.highlight_granularity);
        let highlights = Arc::new(HighlightStore::new(storage.clone(), resolver));

        match highlights.open().await? {
            OpenOutcome::Initialized => info!("Initialized an empty highlight store"),
            OpenOutcome::UpToDate => info!("Highlight store is up to date"),
            OpenOutcome::MigratedFromList(report) | OpenOutcome::Rekeyed(report) => info!(
                "Migrated {} highlights into {} pages ({} skipped)",
                report.highlights, report.pages, report.skipped
            ),
        }

        Ok(Self {
            badge: Arc::new(BadgeReconciler::new(highlights.clone())),
            settings: Arc::new(SettingsStore::new(storage.clone(), config.settings_defaults())),
            last_flashcards: Arc::new(LastFlashcards::new(storage)),
            pipeline: Arc::new(FlashcardPipeline::new(model)),
            tabs: Arc::new(TabRegistry::new()),
            highlights,
            sink,
            config,
        })
    }
}
