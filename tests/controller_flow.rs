mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatdeck::client::{HttpCompletionClient, StaticCredential};
use chatdeck::commands::{ask, TranscriptView};
use chatdeck::config::ApiConfig;
use chatdeck::controller::{Phase, Rejection};
use chatdeck::error::ServiceError;
use chatdeck::runtime::EventOutcome;
use chatdeck::session::{MemoryStore, MessageContent, Role, SessionStore};
use chatdeck::theme::Theme;

use common::{create_temp_sled, engine, ScriptedService};

fn view() -> TranscriptView {
    TranscriptView::new(Theme::Dark.palette())
}

#[tokio::test]
async fn test_busy_rejection_while_request_in_flight() {
    let service = Arc::new(ScriptedService::default());
    let mut engine = engine(Arc::new(MemoryStore::new()), service.clone());

    engine
        .runtime
        .submit(&mut engine.controller, "first")
        .unwrap();
    assert_eq!(engine.controller.phase(), Phase::Sending);

    let rejected = engine.runtime.submit(&mut engine.controller, "second");
    assert_eq!(rejected.unwrap_err(), Rejection::Busy);

    engine.settle(&mut view()).await;

    assert_eq!(service.calls(), 1);
    let session = engine.controller.store().active().unwrap();
    let texts: Vec<&str> = session
        .messages
        .iter()
        .map(|m| m.content.as_text())
        .collect();
    assert_eq!(texts, vec!["first", "echo: first"]);
}

#[tokio::test]
async fn test_long_answer_streams_word_by_word() {
    let answer = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(5);
    let answer = answer.trim_end().to_string();
    assert!(answer.chars().count() > 200);

    let service = Arc::new(ScriptedService::with_replies(vec![Ok(answer.clone())]));
    let mut engine = engine(Arc::new(MemoryStore::new()), service);

    engine
        .runtime
        .submit(&mut engine.controller, "tell me something")
        .unwrap();

    let mut deltas = Vec::new();
    let mut saw_streaming = false;
    {
        let chatdeck::commands::Engine {
            controller,
            runtime,
            events,
            ..
        } = &mut engine;
        runtime
            .settle(controller, events, |controller, outcome| {
                if let EventOutcome::Progress(delta) = outcome {
                    saw_streaming |= controller.phase() == Phase::Streaming;
                    deltas.push(delta.clone());
                }
            })
            .await;
    }

    assert!(saw_streaming);
    assert_eq!(deltas.len(), answer.split_whitespace().count());
    assert_eq!(deltas.concat(), answer);
    assert!(engine.controller.visible_buffer().is_none());

    let session = engine.controller.store().active().unwrap();
    assert_eq!(session.messages[1].content.as_text(), answer);
}

#[tokio::test]
async fn test_regenerate_appends_only_assistant_message() {
    let service = Arc::new(ScriptedService::with_replies(vec![
        Ok("first answer".to_string()),
        Ok("second answer".to_string()),
    ]));
    let mut engine = engine(Arc::new(MemoryStore::new()), service.clone());

    engine
        .runtime
        .submit(&mut engine.controller, "question")
        .unwrap();
    engine.settle(&mut view()).await;

    engine.runtime.regenerate(&mut engine.controller).unwrap();
    engine.settle(&mut view()).await;

    assert_eq!(service.prompts(), vec!["question", "question"]);
    let session = engine.controller.store().active().unwrap();
    let roles: Vec<Role> = session.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);
    assert_eq!(session.messages[2].content.as_text(), "second answer");
}

#[tokio::test]
async fn test_image_failure_appends_error_and_returns_to_idle() {
    let service = Arc::new(ScriptedService::with_replies(vec![Err(
        ServiceError::Transport("connection reset".to_string()),
    )]));
    let mut engine = engine(Arc::new(MemoryStore::new()), service);

    engine
        .runtime
        .submit(&mut engine.controller, "/image a lighthouse")
        .unwrap();
    assert_eq!(engine.controller.phase(), Phase::SendingImage);
    engine.settle(&mut view()).await;

    assert!(engine.controller.is_idle());
    let session = engine.controller.store().active().unwrap();
    assert_eq!(session.messages.len(), 2);
    assert!(!session.messages[1].content.is_image());
    assert!(session.messages[1].content.as_text().starts_with("Network error"));
}

#[tokio::test]
async fn test_ask_with_attachment_persists_session() {
    let (backend, dir) = create_temp_sled();
    let report = dir.path().join("report.txt");
    std::fs::write(&report, "Revenue grew 12% in Q1.").unwrap();

    let service = Arc::new(ScriptedService::with_replies(vec![Ok(
        "Revenue grew.".to_string()
    )]));
    let engine = engine(backend.clone(), service.clone());

    ask::ask_with_engine(engine, Some(report), "", 1024, &mut view())
        .await
        .unwrap();

    let prompts = service.prompts();
    let prompt = prompts[0].as_str();
    assert!(prompt.starts_with("Context from file (report.txt):"));
    assert!(prompt.contains("Revenue grew 12% in Q1."));
    assert!(prompt.ends_with("User Question: Summarize this document"));

    let store = SessionStore::open(backend);
    assert_eq!(store.len(), 1);
    let session = store.sessions().next().unwrap();
    assert_eq!(session.title, "Analyzed document: report.txt");
    assert_eq!(session.messages[0].content.as_text(), "Analyzed document: report.txt");
    assert_eq!(session.messages[0].request_text(), prompt);
    assert_eq!(session.messages[1].content.as_text(), "Revenue grew.");
}

#[tokio::test]
async fn test_ask_with_oversized_attachment_fails_without_sending() {
    let (backend, dir) = create_temp_sled();
    let big = dir.path().join("big.txt");
    std::fs::write(&big, "x".repeat(64)).unwrap();

    let service = Arc::new(ScriptedService::default());
    let engine = engine(backend.clone(), service.clone());

    let result = ask::ask_with_engine(engine, Some(big), "what is this?", 16, &mut view()).await;
    assert!(result.is_err());
    assert_eq!(service.calls(), 0);
    assert!(SessionStore::open(backend).is_empty());
}

#[tokio::test]
async fn test_ask_with_nothing_to_send_fails() {
    let service = Arc::new(ScriptedService::default());
    let engine = engine(Arc::new(MemoryStore::new()), service.clone());

    let result = ask::ask_with_engine(engine, None, "   ", 1024, &mut view()).await;
    assert!(result.is_err());
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_full_exchange_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ai_response"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "Canberra" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/generate_image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "image_url": "https://cdn.example/opera-house.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ApiConfig {
        base_url: server.uri(),
        ..ApiConfig::default()
    };
    let client = HttpCompletionClient::new(config, Arc::new(StaticCredential::new("t"))).unwrap();
    let mut engine = engine(Arc::new(MemoryStore::new()), Arc::new(client));

    engine
        .runtime
        .submit(&mut engine.controller, "Capital of Australia?")
        .unwrap();
    engine.settle(&mut view()).await;

    engine
        .runtime
        .submit(&mut engine.controller, "/image the opera house")
        .unwrap();
    engine.settle(&mut view()).await;

    let session = engine.controller.store().active().unwrap();
    assert_eq!(session.title, "Capital of Australia?");
    assert_eq!(session.messages.len(), 4);
    assert_eq!(session.messages[1].content.as_text(), "Canberra");
    assert_eq!(
        session.messages[3].content,
        MessageContent::Image {
            url: "https://cdn.example/opera-house.png".to_string()
        }
    );
}
