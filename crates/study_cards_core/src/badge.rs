//! crates/study_cards_core/src/badge.rs
//!
//! The toolbar badge shows how many highlights are saved for the page in the active
//! tab. It is always recomputed from the store for the active page's key, never kept
//! as a running total.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::highlights::HighlightStore;
use crate::ports::{PortError, PortResult};

pub const ACCENT_COLOR: &str = "#4285f4";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BadgeState {
    /// Empty when no badge should be shown.
    pub text: String,
    pub color: Option<&'static str>,
}

impl BadgeState {
    pub fn is_hidden(&self) -> bool {
        self.text.is_empty()
    }
}

pub fn badge_for_count(count: usize) -> BadgeState {
    if count == 0 {
        return BadgeState::default();
    }
    BadgeState {
        text: count.to_string(),
        color: Some(ACCENT_COLOR),
    }
}

#[derive(Debug, Default)]
struct ActiveTab {
    tab_id: Option<i64>,
    url: Option<String>,
}

#[derive(Debug, Default)]
struct BadgeView {
    active: ActiveTab,
    shown: BadgeState,
    /// Bumped as each refresh starts.
    issued: u64,
    /// The refresh generation that produced `shown`.
    published: u64,
}

pub struct BadgeReconciler {
    highlights: Arc<HighlightStore>,
    view: Mutex<BadgeView>,
}

impl BadgeReconciler {
    pub fn new(highlights: Arc<HighlightStore>) -> Self {
        Self {
            highlights,
            view: Mutex::new(BadgeView::default()),
        }
    }

    /// The active tab changed.
    pub async fn tab_activated(&self, tab_id: i64, url: Option<String>) -> PortResult<BadgeState> {
        {
            let mut view = self.lock()?;
            view.active = ActiveTab {
                tab_id: Some(tab_id),
                url,
            };
        }
        self.refresh().await
    }

    /// A tab's URL changed. Only the active tab affects the badge.
    pub async fn tab_updated(&self, tab_id: i64, url: Option<String>) -> PortResult<Option<BadgeState>> {
        {
            let mut view = self.lock()?;
            if view.active.tab_id != Some(tab_id) {
                return Ok(None);
            }
            view.active.url = url;
        }
        self.refresh().await.map(Some)
    }

    pub fn tab_removed(&self, tab_id: i64) -> PortResult<()> {
        let mut view = self.lock()?;
        if view.active.tab_id == Some(tab_id) {
            view.active = ActiveTab::default();
            view.shown = BadgeState::default();
        }
        Ok(())
    }

    pub fn active_url(&self) -> PortResult<Option<String>> {
        Ok(self.lock()?.active.url.clone())
    }

    /// Recomputes the badge for whichever page is active. Called on load and after
    /// every highlight mutation.
    ///
    /// Refreshes may overlap. A result is published only if no later refresh has
    /// published yet and the active page is still the one that was counted.
    pub async fn refresh(&self) -> PortResult<BadgeState> {
        let (generation, url) = {
            let mut view = self.lock()?;
            view.issued += 1;
            (view.issued, view.active.url.clone())
        };
        let state = match url.as_deref() {
            Some(url) => badge_for_count(self.highlights.count(Some(url)).await?),
            None => BadgeState::default(),
        };

        let mut view = self.lock()?;
        if generation > view.published && view.active.url == url {
            view.shown = state;
            view.published = generation;
        }
        Ok(view.shown.clone())
    }

    pub fn current(&self) -> PortResult<BadgeState> {
        Ok(self.lock()?.shown.clone())
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, BadgeView>> {
        self.view
            .lock()
            .map_err(|_| PortError::Unexpected("badge state lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HighlightDraft;
    use crate::memory_store::MemoryStore;
    use crate::page_key::{KeyGranularity, PageKeyResolver};
    use crate::ports::KeyValueStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    #[test]
    fn zero_hides_the_badge() {
        assert!(badge_for_count(0).is_hidden());
        assert_eq!(badge_for_count(0).color, None);
    }

    #[test]
    fn positive_counts_show_decimal_text_in_accent_color() {
        let state = badge_for_count(12);
        assert_eq!(state.text, "12");
        assert_eq!(state.color, Some(ACCENT_COLOR));
    }

    async fn fixture() -> (Arc<HighlightStore>, BadgeReconciler) {
        fixture_on(Arc::new(MemoryStore::new())).await
    }

    async fn fixture_on(storage: Arc<dyn KeyValueStore>) -> (Arc<HighlightStore>, BadgeReconciler) {
        let store = Arc::new(HighlightStore::new(storage, PageKeyResolver::new(KeyGranularity::Page)));
        store.open().await.unwrap();
        for (content, url) in [("a1", "https://x.example/a"), ("a2", "https://x.example/a"), ("b1", "https://x.example/b")] {
            store
                .add(HighlightDraft {
                    content: content.to_string(),
                    title: String::new(),
                    url: Some(url.to_string()),
                })
                .await
                .unwrap();
        }
        let badge = BadgeReconciler::new(store.clone());
        (store, badge)
    }

    #[tokio::test]
    async fn badge_follows_the_active_page_not_the_total() {
        let (_, badge) = fixture().await;

        let state = badge.tab_activated(1, Some("https://x.example/a".to_string())).await.unwrap();
        assert_eq!(state.text, "2");

        let state = badge.tab_activated(2, Some("https://x.example/b".to_string())).await.unwrap();
        assert_eq!(state.text, "1");
    }

    #[tokio::test]
    async fn only_navigation_in_the_active_tab_counts() {
        let (_, badge) = fixture().await;
        badge.tab_activated(1, Some("https://x.example/a".to_string())).await.unwrap();

        let ignored = badge.tab_updated(9, Some("https://x.example/b".to_string())).await.unwrap();
        assert_eq!(ignored, None);
        assert_eq!(badge.current().unwrap().text, "2");

        let state = badge
            .tab_updated(1, Some("https://elsewhere.example/".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert!(state.is_hidden());
    }

    #[tokio::test]
    async fn mutations_are_reflected_after_refresh() {
        let (store, badge) = fixture().await;
        badge.tab_activated(1, Some("https://x.example/b".to_string())).await.unwrap();

        store.clear(Some("https://x.example/b")).await.unwrap();
        assert!(badge.refresh().await.unwrap().is_hidden());
    }

    #[tokio::test]
    async fn closing_the_active_tab_hides_the_badge() {
        let (_, badge) = fixture().await;
        badge.tab_activated(4, Some("https://x.example/a".to_string())).await.unwrap();
        badge.tab_removed(4).unwrap();
        assert!(badge.current().unwrap().is_hidden());
        assert_eq!(badge.active_url().unwrap(), None);
    }

    /// Once armed, parks the next read after it has loaded its value until released.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryStore,
        hold_next_read: AtomicBool,
        held: Notify,
        release: Notify,
    }

    #[async_trait]
    impl KeyValueStore for GatedStore {
        async fn get(&self, key: &str) -> PortResult<Option<Value>> {
            let value = self.inner.get(key).await;
            if self.hold_next_read.swap(false, Ordering::SeqCst) {
                self.held.notify_one();
                self.release.notified().await;
            }
            value
        }

        async fn set(&self, key: &str, value: Value) -> PortResult<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> PortResult<()> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn a_slow_refresh_does_not_overwrite_a_newer_one() {
        let storage = Arc::new(GatedStore::default());
        let (store, badge) = fixture_on(storage.clone()).await;
        badge.tab_activated(1, Some("https://x.example/a".to_string())).await.unwrap();
        assert_eq!(badge.current().unwrap().text, "2");

        storage.hold_next_read.store(true, Ordering::SeqCst);
        let slow = badge.refresh();
        let newer = async {
            // The slow refresh has read a count of 2 and is parked.
            storage.held.notified().await;
            store
                .add(HighlightDraft {
                    content: "a3".to_string(),
                    title: String::new(),
                    url: Some("https://x.example/a".to_string()),
                })
                .await
                .unwrap();
            let state = badge.refresh().await.unwrap();
            storage.release.notify_one();
            state
        };
        let (slow, newer) = tokio::join!(slow, newer);

        assert_eq!(newer.text, "3");
        assert_eq!(slow.unwrap().text, "3");
        assert_eq!(badge.current().unwrap().text, "3");
    }
}
