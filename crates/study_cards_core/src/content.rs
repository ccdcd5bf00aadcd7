//! crates/study_cards_core/src/content.rs
//!
//! The output contract of content acquisition. Readability parsing and PDF decoding
//! happen in the browser; what arrives here is already plain text.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedPage {
    pub title: String,
    pub content: String,
}

impl ExtractedPage {
    pub fn from_html(title: Option<String>, text: String) -> Self {
        Self {
            title: title.unwrap_or_default(),
            content: text,
        }
    }

    /// Joins a PDF text layer: items within a page by spaces, one line per page.
    pub fn from_pdf(title: Option<String>, pages: &[Vec<String>]) -> Self {
        let mut content = String::new();
        for items in pages {
            content.push_str(&items.join(" "));
            content.push('\n');
        }
        Self {
            title: title.unwrap_or_default(),
            content,
        }
    }
}

/// True when a main-frame `Content-Type` header denotes a PDF document.
pub fn is_pdf_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/pdf")
}
