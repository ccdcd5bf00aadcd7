//! crates/study_cards_core/src/sink.rs
//!
//! Delivering generated cards to the external flashcard app and summarizing how
//! many made it. Rejected cards are an expected outcome, not an error.

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::Flashcard;
use crate::ports::{FlashcardSink, PortError, PortResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub added: usize,
    pub total: usize,
    pub note_ids: Vec<Option<u64>>,
    pub synced: bool,
    pub sync_error: Option<String>,
}

impl DeliveryReport {
    pub fn summary(&self) -> String {
        format!("{} of {} added", self.added, self.total)
    }
}

/// Adds `cards` to `deck_name`, then syncs on a best-effort basis.
pub async fn deliver(sink: &dyn FlashcardSink, cards: &[Flashcard], deck_name: &str) -> PortResult<DeliveryReport> {
    if cards.is_empty() {
        return Err(PortError::InvalidInput("There are no flashcards to send".to_string()));
    }
    if !sink.is_available().await {
        return Err(PortError::Network(
            "The flashcard app is not reachable. Make sure it is running with AnkiConnect installed.".to_string(),
        ));
    }

    let note_ids = sink.add_cards(cards, deck_name).await?;
    let added = note_ids.iter().filter(|id| id.is_some()).count();
    info!("Added {} of {} cards to deck '{}'", added, cards.len(), deck_name);

    let (synced, sync_error) = if added == 0 {
        (false, None)
    } else {
        match sink.sync().await {
            Ok(()) => (true, None),
            Err(e) => {
                warn!("Sync after adding cards failed: {}", e);
                (false, Some(e.to_string()))
            }
        }
    };

    Ok(DeliveryReport {
        added,
        total: cards.len(),
        note_ids,
        synced,
        sync_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSink {
        available: bool,
        results: Vec<Option<u64>>,
        sync_fails: bool,
        syncs: AtomicUsize,
    }

    impl FakeSink {
        fn new(results: Vec<Option<u64>>) -> Self {
            Self {
                available: true,
                results,
                sync_fails: false,
                syncs: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FlashcardSink for FakeSink {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn list_decks(&self) -> PortResult<Vec<String>> {
            Ok(vec!["Default".to_string()])
        }

        async fn add_cards(&self, _cards: &[Flashcard], _deck_name: &str) -> PortResult<Vec<Option<u64>>> {
            Ok(self.results.clone())
        }

        async fn sync(&self) -> PortResult<()> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            if self.sync_fails {
                return Err(PortError::Rejected("sync disabled".to_string()));
            }
            Ok(())
        }
    }

    fn three_cards() -> Vec<Flashcard> {
        vec![
            Flashcard::new("Q1", "A1"),
            Flashcard::new("Q2", "A2"),
            Flashcard::new("Q3", "A3"),
        ]
    }

    #[tokio::test]
    async fn duplicates_are_reported_as_a_partial_count() {
        let sink = FakeSink::new(vec![Some(101), None, Some(103)]);
        let report = deliver(&sink, &three_cards(), "Default").await.unwrap();

        assert_eq!(report.summary(), "2 of 3 added");
        assert!(report.synced);
        assert_eq!(sink.syncs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sync_failure_does_not_undo_the_add() {
        let mut sink = FakeSink::new(vec![Some(1), Some(2), Some(3)]);
        sink.sync_fails = true;
        let report = deliver(&sink, &three_cards(), "Default").await.unwrap();

        assert_eq!(report.added, 3);
        assert!(!report.synced);
        assert!(report.sync_error.is_some());
    }

    #[tokio::test]
    async fn unavailable_sink_is_a_network_error() {
        let mut sink = FakeSink::new(vec![]);
        sink.available = false;
        let err = deliver(&sink, &three_cards(), "Default").await.unwrap_err();
        assert!(matches!(err, PortError::Network(_)));
    }

    #[tokio::test]
    async fn nothing_added_skips_the_sync() {
        let sink = FakeSink::new(vec![None, None, None]);
        let report = deliver(&sink, &three_cards(), "Default").await.unwrap();
        assert_eq!(report.summary(), "0 of 3 added");
        assert_eq!(sink.syncs.load(Ordering::SeqCst), 0);
    }
}
