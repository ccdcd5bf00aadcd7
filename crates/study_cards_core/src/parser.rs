//! crates/study_cards_core/src/parser.rs
//!
//! Turns a model's free-form reply into a strict list of flashcards.
//!
//! The reply is walked through a fixed sequence of stages: trim, strip a markdown
//! fence, slice out the outermost JSON array, decode. Each stage either hands a
//! narrower slice to the next or stops with a named `ParseFailure`. Nothing here
//! guesses: a reply that does not decode is an error, never an empty set.

use serde_json::Value;

use crate::domain::Flashcard;
use crate::export;

/// The reason a reply could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("the reply was empty")]
    EmptyReply,
    #[error("no JSON array was found in the reply")]
    NoArray,
    #[error("the reply is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("card {index} is not an object")]
    NotAnObject { index: usize },
    #[error("card {index} has no string field `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("card {index} has an empty `{field}`")]
    EmptyField { index: usize, field: &'static str },
    #[error("the reply is not valid CSV: {0}")]
    InvalidCsv(String),
    #[error("CSV row {row} does not have exactly two fields")]
    WrongFieldCount { row: usize },
}

/// The reply shape the prompt asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    /// A JSON array of `{front, back}` objects.
    #[default]
    Json,
    /// Older prompts asked for `"question","answer"` CSV lines, sometimes with a header.
    LegacyCsv,
}

enum Stage<'a> {
    Trim(&'a str),
    StripFence(&'a str),
    SliceArray(&'a str),
    DecodeJson(&'a str),
    DecodeCsv(&'a str),
}

/// Parses `raw` according to `format`.
pub fn parse_reply(raw: &str, format: ResponseFormat) -> Result<Vec<Flashcard>, ParseFailure> {
    let mut stage = Stage::Trim(raw);
    loop {
        stage = match stage {
            Stage::Trim(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(ParseFailure::EmptyReply);
                }
                Stage::StripFence(text)
            }
            Stage::StripFence(text) => {
                let text = strip_fence(text);
                match format {
                    ResponseFormat::Json => Stage::SliceArray(text),
                    ResponseFormat::LegacyCsv => Stage::DecodeCsv(text),
                }
            }
            Stage::SliceArray(text) => Stage::DecodeJson(slice_array(text)?),
            Stage::DecodeJson(text) => return decode_json(text),
            Stage::DecodeCsv(text) => return decode_csv(text),
        };
    }
}

/// Removes a leading ```` ```lang ```` marker and a trailing ```` ``` ````, whatever the tag.
fn strip_fence(text: &str) -> &str {
    let mut text = text;
    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.')))
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }
    let trimmed = text.trim_end();
    if let Some(rest) = trimmed.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Narrows to the span from the first `[` to the last `]`, dropping surrounding prose.
fn slice_array(text: &str) -> Result<&str, ParseFailure> {
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(ParseFailure::NoArray),
    }
}

fn decode_json(text: &str) -> Result<Vec<Flashcard>, ParseFailure> {
    let items: Vec<Value> =
        serde_json::from_str(text).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let object = item.as_object().ok_or(ParseFailure::NotAnObject { index })?;
            let field = |name: &'static str| -> Result<String, ParseFailure> {
                let value = object
                    .get(name)
                    .and_then(Value::as_str)
                    .ok_or(ParseFailure::MissingField { index, field: name })?;
                non_empty(value, index, name)
            };
            Ok(Flashcard {
                front: field("front")?,
                back: field("back")?,
            })
        })
        .collect()
}

fn decode_csv(text: &str) -> Result<Vec<Flashcard>, ParseFailure> {
    let records =
        export::read_records(text).map_err(|e| ParseFailure::InvalidCsv(e.to_string()))?;

    let mut cards = Vec::with_capacity(records.len());
    for (row, record) in records.into_iter().enumerate() {
        let fields: Vec<&str> = record.iter().map(|f| f.trim()).collect();
        if fields.iter().all(|f| f.is_empty()) {
            continue;
        }
        if fields.len() != 2 {
            return Err(ParseFailure::WrongFieldCount { row });
        }
        if row == 0 && is_header(fields[0], fields[1]) {
            continue;
        }
        cards.push(Flashcard {
            front: non_empty(fields[0], row, "front")?,
            back: non_empty(fields[1], row, "back")?,
        });
    }
    Ok(cards)
}

fn is_header(first: &str, second: &str) -> bool {
    (first.eq_ignore_ascii_case("question") && second.eq_ignore_ascii_case("answer"))
        || (first.eq_ignore_ascii_case("front") && second.eq_ignore_ascii_case("back"))
}

fn non_empty(value: &str, index: usize, field: &'static str) -> Result<String, ParseFailure> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ParseFailure::EmptyField { index, field });
    }
    Ok(value.to_string())
}
