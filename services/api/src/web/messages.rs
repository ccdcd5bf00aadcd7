//! services/api/src/web/messages.rs
//!
//! The message bus. Each request from the extension is handled as one linear async
//! operation and answered with a single reply; failures are scoped to that request.

use crate::web::{
    protocol::{ActionEnvelope, ExtensionReply, ExtensionRequest, ReplyEnvelope},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, LazyLock};
use study_cards_core::{
    content::ExtractedPage,
    deliver,
    domain::{HighlightDraft, SettingsPatch},
    export,
    ports::{PortError, PortResult},
    DeliveryReport, Flashcard, GenerationOptions,
};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\s]").expect("valid file name regex"));

//=========================================================================================
// The Message Bus Handler
//=========================================================================================

/// Handle one message from the extension.
///
/// Always answers with HTTP 200. The reply's `success` flag and `errorKind` tell the
/// caller whether to retry the generation or check connectivity.
#[utoipa::path(
    post,
    path = "/messages",
    request_body(content = ActionEnvelope, description = "An action object; the remaining fields depend on the action."),
    responses(
        (status = 200, description = "The action's reply envelope", body = ReplyEnvelope)
    )
)]
pub async fn message_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ExtensionReply {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("Rejected message body: {}", rejection.body_text());
            return ExtensionReply::failure("bad_request", rejection.body_text());
        }
    };
    let request = match serde_json::from_value::<ExtensionRequest>(body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Unrecognized message: {}", e);
            return ExtensionReply::failure("bad_request", format!("Unrecognized message: {}", e));
        }
    };

    let action = request.action();
    match dispatch(&app_state, request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Action {} failed: {}", action, e);
            ExtensionReply::from(e)
        }
    }
}

async fn dispatch(state: &AppState, request: ExtensionRequest) -> PortResult<ExtensionReply> {
    match request {
        //--- Content acquisition ---
        ExtensionRequest::Extract {
            tab_id,
            title,
            content,
            pdf_pages,
            api_key,
        } => {
            info!("Extraction received for tab {:?}", tab_id);
            if let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) {
                state
                    .settings
                    .update(SettingsPatch {
                        api_key: Some(api_key),
                        ..Default::default()
                    })
                    .await?;
            }

            let page = match (pdf_pages, content) {
                (Some(pages), _) => ExtractedPage::from_pdf(title, &pages),
                (None, Some(text)) => ExtractedPage::from_html(title, text),
                (None, None) => {
                    return Err(PortError::InvalidInput(
                        "No content could be extracted from this page".to_string(),
                    ))
                }
            };

            let page = if state.config.cleanup_extracted_text {
                let credentials = state.settings.credentials().await.ok();
                state.pipeline.clean_extracted(page, credentials.as_ref()).await
            } else {
                page
            };
            Ok(ExtensionReply::ok(page))
        }

        //--- Highlights ---
        ExtensionRequest::SaveHighlight { content, title, url } => {
            let outcome = state
                .highlights
                .add(HighlightDraft { content, title, url })
                .await?;
            refresh_badge(state).await;
            Ok(ExtensionReply::ok(json!({
                "message": "Highlight saved successfully",
                "count": outcome.page_count,
                "highlight": outcome.saved,
            })))
        }
        ExtensionRequest::GetHighlights { url } => {
            let highlights = state.highlights.list(url.as_deref()).await?;
            Ok(ExtensionReply::ok(json!({ "highlights": highlights })))
        }
        ExtensionRequest::RemoveHighlight { id } => {
            let outcome = state.highlights.remove(id).await?;
            refresh_badge(state).await;
            Ok(ExtensionReply::ok(outcome))
        }
        ExtensionRequest::ClearHighlights { url } => {
            let cleared = state.highlights.clear(url.as_deref()).await?;
            refresh_badge(state).await;
            Ok(ExtensionReply::ok(json!({ "cleared": cleared })))
        }

        //--- Tabs and badge ---
        ExtensionRequest::GetPdfStatus { tab_id } => {
            let is_pdf = state.tabs.is_pdf(tab_id).await.unwrap_or(false);
            Ok(ExtensionReply::ok(json!({ "isPDF": is_pdf })))
        }
        ExtensionRequest::ReportContentType {
            tab_id,
            content_type,
        } => {
            let is_pdf = state.tabs.report_content_type(tab_id, &content_type).await;
            Ok(ExtensionReply::ok(json!({ "isPDF": is_pdf })))
        }
        ExtensionRequest::TabActivated { tab_id, url } => {
            let badge = state.badge.tab_activated(tab_id, url).await?;
            Ok(ExtensionReply::ok(json!({ "badge": badge })))
        }
        ExtensionRequest::TabUpdated { tab_id, url } => {
            let badge = state.badge.tab_updated(tab_id, url).await?;
            Ok(ExtensionReply::ok(json!({ "badge": badge })))
        }
        ExtensionRequest::TabRemoved { tab_id } => {
            state.badge.tab_removed(tab_id)?;
            state.tabs.forget(tab_id).await;
            Ok(ExtensionReply::ok(json!({})))
        }

        //--- Generation ---
        ExtensionRequest::GenerateFlashcards {
            text,
            title,
            url,
            preference,
        } => {
            let request_id = Uuid::new_v4();
            generate_from_text(state, request_id, &text, &title, url.as_deref(), preference)
                .instrument(info_span!("generate", %request_id))
                .await
        }
        ExtensionRequest::GenerateFromHighlights {
            url,
            title,
            article,
            preference,
        } => {
            let request_id = Uuid::new_v4();
            generate_from_highlights(state, request_id, &url, &title, article.as_deref(), preference)
                .instrument(info_span!("generate_from_highlights", %request_id))
                .await
        }
        ExtensionRequest::Summarize { text } => {
            let request_id = Uuid::new_v4();
            summarize(state, request_id, &text)
                .instrument(info_span!("summarize", %request_id))
                .await
        }
        ExtensionRequest::GetLastFlashcards { url } => {
            let set = state.last_flashcards.load_for(&url).await?;
            Ok(ExtensionReply::ok(json!({ "flashcardSet": set })))
        }

        //--- Export and sink ---
        ExtensionRequest::ExportCsv { flashcards, title } => {
            if flashcards.is_empty() {
                return Err(PortError::InvalidInput("There are no flashcards to export".to_string()));
            }
            let csv = export::to_csv(&flashcards)?;
            Ok(ExtensionReply::ok(json!({
                "fileName": csv_file_name(&title),
                "csv": csv,
            })))
        }
        ExtensionRequest::SendToAnki {
            flashcards,
            deck_name,
        } => {
            let deck_name = match deck_name.filter(|d| !d.trim().is_empty()) {
                Some(deck) => deck,
                None => state.settings.deck_name().await?,
            };
            let report = deliver(state.sink.as_ref(), &flashcards, &deck_name).await?;
            Ok(ExtensionReply::ok(DeliveryReply {
                message: report.summary(),
                deck_name,
                report,
            }))
        }
        ExtensionRequest::GetDecks => {
            let decks = state.sink.list_decks().await?;
            Ok(ExtensionReply::ok(json!({ "decks": decks })))
        }
        ExtensionRequest::GetAnkiStatus => {
            let available = state.sink.is_available().await;
            Ok(ExtensionReply::ok(json!({ "available": available })))
        }

        //--- Settings ---
        ExtensionRequest::GetSettings => {
            let settings = state.settings.view().await?;
            Ok(ExtensionReply::ok(json!({ "settings": settings })))
        }
        ExtensionRequest::UpdateSettings { settings } => {
            let updated = state.settings.update(settings).await?;
            Ok(ExtensionReply::ok(json!({ "settings": state.settings.view_of(updated) })))
        }
    }
}

//=========================================================================================
// Generation Operations
//=========================================================================================

async fn generate_from_text(
    state: &AppState,
    request_id: Uuid,
    text: &str,
    title: &str,
    url: Option<&str>,
    preference: Option<String>,
) -> PortResult<ExtensionReply> {
    let credentials = state.settings.credentials().await?;
    let options = generation_options(state, preference).await?;
    let flashcards = state.pipeline.generate(text, &options, &credentials).await?;
    if let Some(url) = url {
        state.last_flashcards.save(title, url, &flashcards).await?;
    }
    Ok(generated(request_id, flashcards))
}

async fn generate_from_highlights(
    state: &AppState,
    request_id: Uuid,
    url: &str,
    title: &str,
    article: Option<&str>,
    preference: Option<String>,
) -> PortResult<ExtensionReply> {
    let credentials = state.settings.credentials().await?;
    let options = generation_options(state, preference).await?;
    let highlights = state.highlights.list_page(url).await?;
    info!("Generating from {} highlights", highlights.len());

    let page_label = if title.trim().is_empty() {
        state.highlights.key_for(Some(url)).into_string()
    } else {
        title.to_string()
    };
    let flashcards = state
        .pipeline
        .generate_from_highlights(&highlights, &page_label, article, &options, &credentials)
        .await?;
    state.last_flashcards.save(&page_label, url, &flashcards).await?;
    Ok(generated(request_id, flashcards))
}

async fn summarize(state: &AppState, request_id: Uuid, text: &str) -> PortResult<ExtensionReply> {
    let credentials = state.settings.credentials().await?;
    let summary = state.pipeline.summarize(text, &credentials).await?;
    Ok(ExtensionReply::ok(json!({ "requestId": request_id, "summary": summary })))
}

//=========================================================================================
// Helpers
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryReply {
    message: String,
    deck_name: String,
    #[serde(flatten)]
    report: DeliveryReport,
}

fn generated(request_id: Uuid, flashcards: Vec<Flashcard>) -> ExtensionReply {
    ExtensionReply::ok(json!({
        "requestId": request_id,
        "flashcards": flashcards,
    }))
}

async fn generation_options(state: &AppState, preference: Option<String>) -> PortResult<GenerationOptions> {
    Ok(GenerationOptions {
        preference: preference.filter(|p| !p.trim().is_empty()),
        max_cards: state.settings.max_flashcards().await?,
    })
}

/// A highlight mutation already succeeded; a badge failure must not turn it into an
/// error reply.
async fn refresh_badge(state: &AppState) {
    if let Err(e) = state.badge.refresh().await {
        warn!("Badge refresh failed: {}", e);
    }
}

/// `<title>_flashcards.csv`, keeping only word characters and whitespace of the title.
pub fn csv_file_name(title: &str) -> String {
    let sanitized = UNSAFE_FILE_CHARS.replace_all(title, "");
    let stem = match sanitized.trim() {
        "" => "flashcards",
        stem => stem,
    };
    format!("{}_flashcards.csv", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_file_names_drop_punctuation() {
        assert_eq!(csv_file_name("Cells: An Intro!"), "Cells An Intro_flashcards.csv");
        assert_eq!(csv_file_name("???"), "flashcards_flashcards.csv");
        assert_eq!(csv_file_name(""), "flashcards_flashcards.csv");
    }
}
