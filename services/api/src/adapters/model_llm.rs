//! services/api/src/adapters/model_llm.rs
//!
//! This module contains the adapter for the flashcard/summary model.
//! It implements the `LanguageModelService` port from the `core` crate against any
//! OpenAI-compatible chat-completions endpoint (OpenRouter by default).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use study_cards_core::{
    domain::ModelCredentials,
    ports::{LanguageModelService, PortError, PortResult},
};
use tracing::{error, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LanguageModelService` using an OpenAI-compatible LLM.
///
/// The API key is supplied per request, so a client is built for each call from the
/// configured base URL. Failed calls are not retried; the extension shows the error and
/// the user decides whether to try again.
#[derive(Clone)]
pub struct ChatCompletionAdapter {
    api_base: String,
}

impl ChatCompletionAdapter {
    /// Creates a new `ChatCompletionAdapter` for the given endpoint base URL.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }

    fn client(&self, api_key: &str) -> Client<OpenAIConfig> {
        let config = OpenAIConfig::new()
            .with_api_base(self.api_base.clone())
            .with_api_key(api_key);
        // A zero elapsed-time budget stops the client from retrying 5xx and 429 replies.
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Client::with_config(config).with_backoff(no_retry)
    }
}

fn map_openai_error(e: OpenAIError) -> PortError {
    match e {
        OpenAIError::ApiError(api) => PortError::Rejected(api.message),
        other => PortError::Network(other.to_string()),
    }
}

//=========================================================================================
// `LanguageModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LanguageModelService for ChatCompletionAdapter {
    /// Sends a single user-role prompt and returns the first choice's text.
    async fn complete(&self, prompt: &str, credentials: &ModelCredentials) -> PortResult<String> {
        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&credentials.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        info!("Calling model {} ({} prompt bytes)", credentials.model, prompt.len());

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client(&credentials.api_key)
            .chat()
            .create(request)
            .await
            .map_err(|e| {
                error!("Model request failed: {}", e);
                map_openai_error(e)
            })?;

        // The endpoint answered, so an empty reply is the model's doing, not the network's.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| PortError::Rejected("The model reply contained no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn creds() -> ModelCredentials {
        ModelCredentials {
            api_key: "sk-test".to_string(),
            model: "test/model".to_string(),
        }
    }

    fn completion_body(content: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "id": "gen-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "test/model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        })
    }

    #[tokio::test]
    async fn returns_the_first_choice_text() {
        let mock_server = MockServer::start().await;

        let body = completion_body(Some("[{\"front\":\"Q\",\"back\":\"A\"}]"));

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/chat/completions"))
            .and(matchers::header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let adapter = ChatCompletionAdapter::new(mock_server.uri());
        let reply = adapter.complete("make cards", &creds()).await.unwrap();
        assert_eq!(reply, "[{\"front\":\"Q\",\"back\":\"A\"}]");
    }

    #[tokio::test]
    async fn api_errors_are_reported_as_rejections() {
        let mock_server = MockServer::start().await;

        let body = serde_json::json!({
            "error": { "message": "Invalid API key", "type": "invalid_request_error", "param": null, "code": null }
        });
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(body))
            .mount(&mock_server)
            .await;

        let adapter = ChatCompletionAdapter::new(mock_server.uri());
        let err = adapter.complete("make cards", &creds()).await.unwrap_err();
        assert!(matches!(err, PortError::Rejected(ref msg) if msg.contains("Invalid API key")));
    }

    #[tokio::test]
    async fn server_errors_are_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        // Only reachable if the client tried a second time.
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(Some("late"))))
            .expect(0)
            .mount(&mock_server)
            .await;

        let adapter = ChatCompletionAdapter::new(mock_server.uri());
        let err = adapter.complete("make cards", &creds()).await.unwrap_err();
        assert!(matches!(err, PortError::Rejected(ref msg) if msg.contains("upstream overloaded")));
        mock_server.verify().await;
    }

    #[tokio::test]
    async fn replies_without_text_are_rejections() {
        let mock_server = MockServer::start().await;

        let mut no_choices = completion_body(None);
        no_choices["choices"] = serde_json::json!([]);
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(no_choices))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(None)))
            .mount(&mock_server)
            .await;

        let adapter = ChatCompletionAdapter::new(mock_server.uri());
        for _ in 0..2 {
            let err = adapter.complete("make cards", &creds()).await.unwrap_err();
            assert!(matches!(err, PortError::Rejected(ref msg) if msg.contains("no text")));
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let adapter = ChatCompletionAdapter::new("http://127.0.0.1:9");
        let err = adapter.complete("make cards", &creds()).await.unwrap_err();
        assert!(matches!(err, PortError::Network(_)));
    }
}
