//! crates/study_cards_core/src/export.rs
//!
//! CSV import/export of flashcards: two always-quoted fields per line, no header row.

use crate::domain::Flashcard;
use crate::ports::{PortError, PortResult};

/// Renders cards as `"front","back"` lines. Embedded quotes are doubled.
pub fn to_csv(cards: &[Flashcard]) -> PortResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for card in cards {
        writer
            .write_record([card.front.as_str(), card.back.as_str()])
            .map_err(|e| PortError::Unexpected(format!("CSV write failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| PortError::Unexpected(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| PortError::Unexpected(e.to_string()))
}

/// Reads CSV text into raw records. Rows may have any number of fields.
pub fn read_records(text: &str) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect()
}
