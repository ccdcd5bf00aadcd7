//! crates/study_cards_core/src/pipeline.rs
//!
//! The flashcard generation pipeline: prompt, one model round trip, tolerant parse.

use std::sync::Arc;
use tracing::{info, warn};

use crate::content::ExtractedPage;
use crate::domain::{Flashcard, Highlight, ModelCredentials};
use crate::parser::{parse_reply, ResponseFormat};
use crate::ports::{LanguageModelService, PortError, PortResult};
use crate::prompt;

/// Per-request knobs for generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Free-form user instructions, ranked above the default guidelines.
    pub preference: Option<String>,
    /// Upper bound on returned cards. `None` accepts whatever the model returns.
    pub max_cards: Option<usize>,
}

pub struct FlashcardPipeline {
    model: Arc<dyn LanguageModelService>,
    format: ResponseFormat,
}

impl FlashcardPipeline {
    pub fn new(model: Arc<dyn LanguageModelService>) -> Self {
        Self {
            model,
            format: ResponseFormat::Json,
        }
    }

    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    /// Generates flashcards from arbitrary source text.
    ///
    /// An empty source is still sent; the model decides what to do with it.
    pub async fn generate(
        &self,
        source_text: &str,
        options: &GenerationOptions,
        credentials: &ModelCredentials,
    ) -> PortResult<Vec<Flashcard>> {
        ensure_credentials(credentials)?;

        let prompt = prompt::flashcard_prompt(
            source_text,
            options.preference.as_deref(),
            options.max_cards,
        );
        let reply = self.model.complete(&prompt, credentials).await?;

        let mut cards = parse_reply(&reply, self.format).map_err(|failure| {
            warn!("Model reply could not be parsed: {}", failure);
            PortError::MalformedResponse {
                failure,
                raw: reply.clone(),
            }
        })?;

        if let Some(limit) = options.max_cards {
            if cards.len() > limit {
                warn!("Model returned {} cards, keeping the first {}", cards.len(), limit);
                cards.truncate(limit);
            }
        }
        info!("Generated {} flashcards", cards.len());
        Ok(cards)
    }

    /// Generates one card per saved highlight, using the article as context.
    pub async fn generate_from_highlights(
        &self,
        highlights: &[Highlight],
        page_label: &str,
        article: Option<&str>,
        options: &GenerationOptions,
        credentials: &ModelCredentials,
    ) -> PortResult<Vec<Flashcard>> {
        if highlights.is_empty() {
            return Err(PortError::InvalidInput(
                "No highlights found for this page. Please highlight some text first.".to_string(),
            ));
        }
        let source = prompt::highlights_source(highlights, page_label, article);
        self.generate(&source, options, credentials).await
    }

    pub async fn summarize(&self, text: &str, credentials: &ModelCredentials) -> PortResult<String> {
        ensure_credentials(credentials)?;
        let reply = self
            .model
            .complete(&prompt::summary_prompt(text), credentials)
            .await?;
        Ok(reply.trim().to_string())
    }

    /// Asks the model to strip navigation and boilerplate from extracted text.
    /// Any failure falls back to the original page.
    pub async fn clean_extracted(
        &self,
        page: ExtractedPage,
        credentials: Option<&ModelCredentials>,
    ) -> ExtractedPage {
        let Some(credentials) = credentials.filter(|c| !c.api_key.trim().is_empty()) else {
            return page;
        };

        match self
            .model
            .complete(&prompt::cleanup_prompt(&page.content), credentials)
            .await
        {
            Ok(cleaned) if !cleaned.trim().is_empty() => {
                info!("Extracted text cleaned ({} -> {} bytes)", page.content.len(), cleaned.len());
                ExtractedPage {
                    title: page.title,
                    content: cleaned,
                }
            }
            Ok(_) => {
                warn!("Text cleanup returned nothing, keeping the original text");
                page
            }
            Err(e) => {
                warn!("Text cleanup failed, keeping the original text: {}", e);
                page
            }
        }
    }
}

fn ensure_credentials(credentials: &ModelCredentials) -> PortResult<()> {
    if credentials.api_key.trim().is_empty() {
        return Err(PortError::InvalidInput("Please enter your API key".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseFailure;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: PortResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: PortError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(error),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModelService for ScriptedModel {
        async fn complete(&self, prompt: &str, _credentials: &ModelCredentials) -> PortResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(PortError::Network(msg)) => Err(PortError::Network(msg.clone())),
                Err(other) => Err(PortError::Unexpected(other.to_string())),
            }
        }
    }

    fn creds() -> ModelCredentials {
        ModelCredentials {
            api_key: "sk-test".to_string(),
            model: "test/model".to_string(),
        }
    }

    #[tokio::test]
    async fn generates_cards_from_a_fenced_reply() {
        let model = ScriptedModel::replying("```json\n[{\"front\":\"Q1\",\"back\":\"A1\"}]\n```");
        let pipeline = FlashcardPipeline::new(model.clone());

        let cards = pipeline
            .generate("Some article", &GenerationOptions::default(), &creds())
            .await
            .unwrap();
        assert_eq!(cards, vec![Flashcard::new("Q1", "A1")]);
        assert_eq!(model.calls(), 1);
        assert!(model.prompts.lock().unwrap()[0].ends_with("Some article"));
    }

    #[tokio::test]
    async fn garbage_reply_keeps_the_raw_text() {
        let model = ScriptedModel::replying("I'm sorry, I can't do that.");
        let pipeline = FlashcardPipeline::new(model);

        let err = pipeline
            .generate("text", &GenerationOptions::default(), &creds())
            .await
            .unwrap_err();
        match err {
            PortError::MalformedResponse { failure, raw } => {
                assert_eq!(failure, ParseFailure::NoArray);
                assert_eq!(raw, "I'm sorry, I can't do that.");
            }
            other => panic!("expected a malformed response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let model = ScriptedModel::replying("[]");
        let pipeline = FlashcardPipeline::new(model.clone());
        let no_key = ModelCredentials {
            api_key: " ".to_string(),
            model: "m".to_string(),
        };

        let err = pipeline
            .generate("text", &GenerationOptions::default(), &no_key)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn empty_source_is_still_sent_and_zero_cards_is_fine() {
        let model = ScriptedModel::replying("[]");
        let pipeline = FlashcardPipeline::new(model.clone());

        let cards = pipeline
            .generate("", &GenerationOptions::default(), &creds())
            .await
            .unwrap();
        assert!(cards.is_empty());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn card_limit_truncates_extra_cards() {
        let reply = r#"[{"front":"1","back":"a"},{"front":"2","back":"b"},{"front":"3","back":"c"}]"#;
        let pipeline = FlashcardPipeline::new(ScriptedModel::replying(reply));
        let options = GenerationOptions {
            preference: None,
            max_cards: Some(2),
        };

        let cards = pipeline.generate("text", &options, &creds()).await.unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].front, "2");
    }

    #[tokio::test]
    async fn network_failures_pass_through_unchanged() {
        let pipeline =
            FlashcardPipeline::new(ScriptedModel::failing(PortError::Network("timed out".to_string())));
        let err = pipeline
            .generate("text", &GenerationOptions::default(), &creds())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Network(_)));
    }

    #[tokio::test]
    async fn legacy_csv_format_is_supported() {
        let model = ScriptedModel::replying("\"Question\",\"Answer\"\n\"Q\",\"A\"");
        let pipeline = FlashcardPipeline::new(model).with_format(ResponseFormat::LegacyCsv);
        let cards = pipeline
            .generate("text", &GenerationOptions::default(), &creds())
            .await
            .unwrap();
        assert_eq!(cards, vec![Flashcard::new("Q", "A")]);
    }

    #[tokio::test]
    async fn highlights_are_required_for_highlight_generation() {
        let model = ScriptedModel::replying("[]");
        let pipeline = FlashcardPipeline::new(model.clone());
        let err = pipeline
            .generate_from_highlights(&[], "example.com", None, &GenerationOptions::default(), &creds())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn cleanup_falls_back_to_the_original_text() {
        let page = ExtractedPage {
            title: "T".to_string(),
            content: "raw body".to_string(),
        };
        let failing =
            FlashcardPipeline::new(ScriptedModel::failing(PortError::Network("down".to_string())));
        assert_eq!(failing.clean_extracted(page.clone(), Some(&creds())).await, page);

        let cleaning = FlashcardPipeline::new(ScriptedModel::replying("clean body"));
        assert_eq!(
            cleaning.clean_extracted(page.clone(), Some(&creds())).await.content,
            "clean body"
        );
        assert_eq!(cleaning.clean_extracted(page.clone(), None).await, page);
    }
}
