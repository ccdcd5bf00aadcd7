//! services/api/src/adapters/anki_connect.rs
//!
//! The flashcard sink adapter. It implements the `FlashcardSink` port from the `core`
//! crate against AnkiConnect's local control API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use study_cards_core::{
    domain::Flashcard,
    ports::{FlashcardSink, PortError, PortResult},
};
use tracing::{debug, warn};

/// The AnkiConnect protocol version requests are written against.
const API_VERSION: u32 = 6;
const NOTE_TAG: &str = "study-cards";
/// Idempotent reads are attempted this many times before giving up.
const READ_ATTEMPTS: usize = 2;

#[derive(Debug, Serialize)]
struct Request<'a> {
    action: &'a str,
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct AnkiConnectAdapter {
    client: Client,
    url: String,
    min_version: u32,
    model_name: String,
}

impl AnkiConnectAdapter {
    pub fn new(url: impl Into<String>, min_version: u32) -> PortResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PortError::Unexpected(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            min_version,
            model_name: "Basic".to_string(),
        })
    }

    async fn send<T: DeserializeOwned>(&self, action: &str, params: Option<Value>) -> PortResult<ApiResponse<T>> {
        let body = Request {
            action,
            version: API_VERSION,
            params,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Network(format!("AnkiConnect {} failed: {}", action, e)))?;

        if !response.status().is_success() {
            return Err(PortError::Network(format!(
                "AnkiConnect {} returned HTTP {}",
                action,
                response.status()
            )));
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| PortError::Network(format!("AnkiConnect {} sent an unreadable body: {}", action, e)))
    }

    /// Runs an action whose `error` field must be null.
    async fn invoke<T: DeserializeOwned>(&self, action: &str, params: Option<Value>) -> PortResult<Option<T>> {
        let response = self.send::<T>(action, params).await?;
        if let Some(error) = response.error {
            return Err(PortError::Rejected(format!("AnkiConnect error: {}", error)));
        }
        Ok(response.result)
    }

    /// Like `invoke`, but retries transport failures for actions that are safe to repeat.
    async fn invoke_idempotent<T: DeserializeOwned>(&self, action: &str) -> PortResult<Option<T>> {
        let mut attempt = 1;
        loop {
            match self.invoke::<T>(action, None).await {
                Err(PortError::Network(msg)) if attempt < READ_ATTEMPTS => {
                    debug!("Retrying AnkiConnect {} after: {}", action, msg);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

//=========================================================================================
// `FlashcardSink` Trait Implementation
//=========================================================================================

#[async_trait]
impl FlashcardSink for AnkiConnectAdapter {
    async fn is_available(&self) -> bool {
        match self.invoke_idempotent::<u32>("version").await {
            Ok(Some(version)) if version >= self.min_version => true,
            Ok(version) => {
                warn!("AnkiConnect version {:?} is below the supported {}", version, self.min_version);
                false
            }
            Err(e) => {
                warn!("AnkiConnect not available: {}", e);
                false
            }
        }
    }

    async fn list_decks(&self) -> PortResult<Vec<String>> {
        Ok(self
            .invoke_idempotent::<Vec<String>>("deckNames")
            .await?
            .unwrap_or_default())
    }

    async fn add_cards(&self, cards: &[Flashcard], deck_name: &str) -> PortResult<Vec<Option<u64>>> {
        let notes: Vec<Value> = cards
            .iter()
            .map(|card| {
                json!({
                    "deckName": deck_name,
                    "modelName": self.model_name,
                    "fields": { "Front": card.front, "Back": card.back },
                    "options": { "allowDuplicate": false, "duplicateScope": "deck" },
                    "tags": [NOTE_TAG],
                })
            })
            .collect();

        // Duplicate rejections may arrive as an `error` alongside a per-note result;
        // the per-note result is what counts.
        let response = self
            .send::<Vec<Option<u64>>>("addNotes", Some(json!({ "notes": notes })))
            .await?;
        match (response.result, response.error) {
            (Some(ids), error) => {
                if let Some(error) = error {
                    debug!("AnkiConnect reported partial failure: {}", error);
                }
                Ok(ids)
            }
            (None, Some(error)) => Err(PortError::Rejected(format!("AnkiConnect error: {}", error))),
            (None, None) => Ok(vec![None; cards.len()]),
        }
    }

    async fn sync(&self) -> PortResult<()> {
        self.invoke::<Value>("sync", None).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "anki_connect_tests.rs"]
mod tests;
