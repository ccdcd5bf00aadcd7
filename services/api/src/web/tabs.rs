//! services/api/src/web/tabs.rs
//!
//! Per-tab PDF status, recorded from the main-frame response headers the extension
//! forwards and forgotten when the tab closes.

use std::collections::HashMap;
use study_cards_core::content::is_pdf_content_type;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TabRegistry {
    pdf_status: RwLock<HashMap<i64, bool>>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records whether the tab's main document is a PDF and returns the verdict.
    pub async fn report_content_type(&self, tab_id: i64, content_type: &str) -> bool {
        let is_pdf = is_pdf_content_type(content_type);
        self.pdf_status.write().await.insert(tab_id, is_pdf);
        debug!("Tab {} is PDF: {}", tab_id, is_pdf);
        is_pdf
    }

    /// `None` for tabs that never reported a content type.
    pub async fn is_pdf(&self, tab_id: i64) -> Option<bool> {
        self.pdf_status.read().await.get(&tab_id).copied()
    }

    pub async fn forget(&self, tab_id: i64) {
        self.pdf_status.write().await.remove(&tab_id);
    }
}
