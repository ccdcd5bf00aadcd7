use super::*;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn action(name: &str) -> wiremock::matchers::BodyPartialJsonMatcher {
    body_partial_json(json!({ "action": name, "version": 6 }))
}

async fn adapter_for(server: &MockServer) -> AnkiConnectAdapter {
    AnkiConnectAdapter::new(server.uri(), 6).unwrap()
}

#[tokio::test]
async fn available_when_version_is_supported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(action("version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 6, "error": null})))
        .mount(&server)
        .await;

    assert!(adapter_for(&server).await.is_available().await);
}

#[tokio::test]
async fn old_versions_are_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(action("version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 5, "error": null})))
        .mount(&server)
        .await;

    assert!(!adapter_for(&server).await.is_available().await);
}

#[tokio::test]
async fn unreachable_sink_is_unavailable_not_an_error() {
    let adapter = AnkiConnectAdapter::new("http://127.0.0.1:9", 6).unwrap();
    assert!(!adapter.is_available().await);
}

#[tokio::test]
async fn deck_listing_retries_once_after_a_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(action("deckNames"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(action("deckNames"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": ["Default", "Biology"], "error": null})),
        )
        .mount(&server)
        .await;

    let decks = adapter_for(&server).await.list_decks().await.unwrap();
    assert_eq!(decks, vec!["Default".to_string(), "Biology".to_string()]);
}

#[tokio::test]
async fn add_cards_reports_per_card_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "action": "addNotes",
            "params": { "notes": [{
                "deckName": "Biology",
                "modelName": "Basic",
                "fields": { "Front": "Q1", "Back": "A1" },
                "options": { "allowDuplicate": false, "duplicateScope": "deck" }
            }]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [1001, null, 1003],
            "error": "cannot create note because it is a duplicate"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cards = vec![
        Flashcard::new("Q1", "A1"),
        Flashcard::new("Q2", "A2"),
        Flashcard::new("Q3", "A3"),
    ];
    let ids = adapter_for(&server).await.add_cards(&cards, "Biology").await.unwrap();
    assert_eq!(ids, vec![Some(1001), None, Some(1003)]);
}

#[tokio::test]
async fn add_cards_without_result_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(action("addNotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": null,
            "error": "deck was not found"
        })))
        .mount(&server)
        .await;

    let err = adapter_for(&server)
        .await
        .add_cards(&[Flashcard::new("Q", "A")], "Missing")
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Rejected(_)));
}

#[tokio::test]
async fn sync_errors_surface_to_the_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(action("sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": null, "error": "auth required"})))
        .mount(&server)
        .await;

    let err = adapter_for(&server).await.sync().await.unwrap_err();
    assert!(matches!(err, PortError::Rejected(ref msg) if msg.contains("auth required")));
}
