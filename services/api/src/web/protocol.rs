//! services/api/src/web/protocol.rs
//!
//! Defines the message protocol between the browser extension (content scripts and
//! popup) and the companion service. Every request names an `action`; every reply is
//! a JSON object with a `success` flag and either a payload or an `error`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use study_cards_core::{domain::SettingsPatch, ports::PortError, Flashcard};
use utoipa::ToSchema;

//=========================================================================================
// Messages Sent FROM the Extension TO the Service
//=========================================================================================

/// The actions the extension can send on the message bus.
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ExtensionRequest {
    /// Hands over the text the browser extracted from a tab. HTML pages send the
    /// readability output in `content`; PDFs send the text-layer items per page.
    Extract {
        tab_id: Option<i64>,
        title: Option<String>,
        content: Option<String>,
        pdf_pages: Option<Vec<Vec<String>>>,
        /// Stored in the user settings when present.
        api_key: Option<String>,
    },

    SaveHighlight {
        content: String,
        #[serde(default)]
        title: String,
        url: Option<String>,
    },

    /// Without a `url`, returns the whole store.
    GetHighlights { url: Option<String> },

    RemoveHighlight { id: i64 },

    /// Without a `url`, clears every page.
    ClearHighlights {
        #[serde(alias = "websiteUrl")]
        url: Option<String>,
    },

    #[serde(rename = "getPDFStatus")]
    GetPdfStatus { tab_id: i64 },

    /// Forwards a tab's main-frame `Content-Type` header.
    ReportContentType { tab_id: i64, content_type: String },

    TabActivated { tab_id: i64, url: Option<String> },

    TabUpdated { tab_id: i64, url: Option<String> },

    TabRemoved { tab_id: i64 },

    GenerateFlashcards {
        text: String,
        #[serde(default)]
        title: String,
        url: Option<String>,
        preference: Option<String>,
    },

    GenerateFromHighlights {
        url: String,
        #[serde(default)]
        title: String,
        /// Full article text, used as context only.
        article: Option<String>,
        preference: Option<String>,
    },

    Summarize { text: String },

    GetLastFlashcards { url: String },

    ExportCsv {
        flashcards: Vec<Flashcard>,
        #[serde(default)]
        title: String,
    },

    SendToAnki {
        flashcards: Vec<Flashcard>,
        deck_name: Option<String>,
    },

    GetDecks,

    GetAnkiStatus,

    GetSettings,

    UpdateSettings { settings: SettingsPatch },
}

impl ExtensionRequest {
    /// The wire name of the action, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            ExtensionRequest::Extract { .. } => "extract",
            ExtensionRequest::SaveHighlight { .. } => "saveHighlight",
            ExtensionRequest::GetHighlights { .. } => "getHighlights",
            ExtensionRequest::RemoveHighlight { .. } => "removeHighlight",
            ExtensionRequest::ClearHighlights { .. } => "clearHighlights",
            ExtensionRequest::GetPdfStatus { .. } => "getPDFStatus",
            ExtensionRequest::ReportContentType { .. } => "reportContentType",
            ExtensionRequest::TabActivated { .. } => "tabActivated",
            ExtensionRequest::TabUpdated { .. } => "tabUpdated",
            ExtensionRequest::TabRemoved { .. } => "tabRemoved",
            ExtensionRequest::GenerateFlashcards { .. } => "generateFlashcards",
            ExtensionRequest::GenerateFromHighlights { .. } => "generateFromHighlights",
            ExtensionRequest::Summarize { .. } => "summarize",
            ExtensionRequest::GetLastFlashcards { .. } => "getLastFlashcards",
            ExtensionRequest::ExportCsv { .. } => "exportCsv",
            ExtensionRequest::SendToAnki { .. } => "sendToAnki",
            ExtensionRequest::GetDecks => "getDecks",
            ExtensionRequest::GetAnkiStatus => "getAnkiStatus",
            ExtensionRequest::GetSettings => "getSettings",
            ExtensionRequest::UpdateSettings { .. } => "updateSettings",
        }
    }
}

//=========================================================================================
// Replies Sent FROM the Service TO the Extension
//=========================================================================================

/// A reply on the message bus. Always sent with HTTP 200; the `success` field carries
/// the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionReply(Map<String, Value>);

impl ExtensionReply {
    /// A successful reply. Object payloads are merged into the envelope; anything
    /// else is placed under `data`.
    pub fn ok(payload: impl Serialize) -> Self {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(true));
        match serde_json::to_value(payload) {
            Ok(Value::Object(fields)) => body.extend(fields),
            Ok(Value::Null) => {}
            Ok(other) => {
                body.insert("data".to_string(), other);
            }
            Err(e) => return Self::failure("unexpected", format!("Failed to encode reply: {}", e)),
        }
        Self(body)
    }

    pub fn failure(kind: &str, message: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("success".to_string(), Value::Bool(false));
        body.insert("error".to_string(), Value::String(message.into()));
        body.insert("errorKind".to_string(), Value::String(kind.to_string()));
        Self(body)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<PortError> for ExtensionReply {
    fn from(e: PortError) -> Self {
        let mut reply = Self::failure(e.kind(), e.to_string());
        // Keep the raw model text so the user can see what went wrong.
        if let PortError::MalformedResponse { raw, .. } = &e {
            reply.0.insert("rawResponse".to_string(), Value::String(raw.clone()));
        }
        reply
    }
}

impl IntoResponse for ExtensionReply {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self.into_value())).into_response()
    }
}

/// OpenAPI shape of a request. The other fields depend on `action`.
#[derive(Serialize, ToSchema)]
pub struct ActionEnvelope {
    /// e.g. `saveHighlight`, `generateFlashcards`, `sendToAnki`.
    pub action: String,
}

/// OpenAPI shape of the reply envelope.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    pub success: bool,
    /// Present when `success` is false.
    pub error: Option<String>,
    /// One of `input`, `network`, `rejected`, `malformed_response`, `storage`,
    /// `unexpected`, `bad_request`.
    pub error_kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use study_cards_core::ParseFailure;

    fn parse(value: Value) -> ExtensionRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn actions_use_extension_field_names() {
        match parse(json!({"action": "getPDFStatus", "tabId": 4})) {
            ExtensionRequest::GetPdfStatus { tab_id } => assert_eq!(tab_id, 4),
            other => panic!("unexpected {:?}", other),
        }
        match parse(json!({"action": "clearHighlights", "websiteUrl": "https://a.example/x"})) {
            ExtensionRequest::ClearHighlights { url } => {
                assert_eq!(url.as_deref(), Some("https://a.example/x"))
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse(json!({"action": "sendToAnki", "flashcards": [{"front": "Q", "back": "A"}], "deckName": "Bio"})) {
            ExtensionRequest::SendToAnki { flashcards, deck_name } => {
                assert_eq!(flashcards, vec![Flashcard::new("Q", "A")]);
                assert_eq!(deck_name.as_deref(), Some("Bio"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse(json!({"action": "getDecks"})), ExtensionRequest::GetDecks));
    }

    #[test]
    fn unknown_actions_do_not_parse() {
        assert!(serde_json::from_value::<ExtensionRequest>(json!({"action": "explode"})).is_err());
    }

    #[test]
    fn object_payloads_are_merged_into_the_envelope() {
        let reply = ExtensionReply::ok(json!({"count": 3})).into_value();
        assert_eq!(reply, json!({"success": true, "count": 3}));

        let reply = ExtensionReply::ok(vec![1, 2]).into_value();
        assert_eq!(reply, json!({"success": true, "data": [1, 2]}));
    }

    #[test]
    fn malformed_responses_carry_the_raw_text() {
        let reply = ExtensionReply::from(PortError::MalformedResponse {
            failure: ParseFailure::NoArray,
            raw: "I cannot help".to_string(),
        })
        .into_value();
        assert_eq!(reply["success"], json!(false));
        assert_eq!(reply["errorKind"], json!("malformed_response"));
        assert_eq!(reply["rawResponse"], json!("I cannot help"));
    }
}
