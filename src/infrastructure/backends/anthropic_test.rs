use anyhow::bail;
use anyhow::Result;
use mockito::Matcher;
use tokio::sync::mpsc;

use super::Anthropic;
use super::CompletionDelta;
use super::CompletionResponse;
use super::Model;
use super::ModelListResponse;
use crate::domain::models::Backend;
use crate::domain::models::BackendMessage;
use crate::domain::models::BackendPrompt;
use crate::domain::models::Event;
use crate::domain::models::Fragment;
use crate::domain::models::SamplingParams;
use crate::domain::models::TurnRole;

impl Anthropic {
    fn with_url(url: String) -> Anthropic {
        return Anthropic {
            url,
            token: "abc".to_string(),
            timeout: "500".to_string(),
        };
    }
}

fn to_fragments(event: Option<Event>) -> Result<Vec<Fragment>> {
    let fragments = match event {
        Some(Event::BackendFragments(fragments)) => fragments,
        _ => bail!("Wrong type from recv"),
    };

    return Ok(fragments);
}

fn delta(kind: &str, value: &str) -> Result<String> {
    let mut delta = CompletionDelta {
        _type: kind.to_string(),
        ..CompletionDelta::default()
    };
    if kind == "thinking_delta" {
        delta.thinking = value.to_string();
    } else {
        delta.text = value.to_string();
    }

    let line = serde_json::to_string(&CompletionResponse {
        _type: "content_block_delta".to_string(),
        delta: Some(delta),
        error: None,
    })?;

    return Ok(format!("event: content_block_delta\ndata: {line}\n"));
}

fn prompt() -> BackendPrompt {
    return BackendPrompt {
        model: "Claude 3.5 Sonnet".to_string(),
        system_prompt: "Be brief.".to_string(),
        history: vec![BackendMessage::new(TurnRole::User, "Hi")],
        query: BackendMessage::new(TurnRole::User, "What is 6 x 7?"),
        sampling: SamplingParams {
            temperature: 0.5,
            top_p: 0.9,
            top_k: 250,
            max_tokens: 1024,
        },
    };
}

#[tokio::test]
async fn it_skips_health_check_for_official_api() {
    let backend = Anthropic::with_url("https://api.anthropic.com".to_string());
    let res = backend.health_check().await;

    assert!(res.is_ok());
}

#[tokio::test]
async fn it_successfully_health_checks_proxies() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(200)
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn it_fails_health_checks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(500)
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let res = backend.health_check().await;

    assert!(res.is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn it_fails_health_checks_without_token() {
    let backend = Anthropic {
        url: "https://api.anthropic.com".to_string(),
        token: "".to_string(),
        timeout: "500".to_string(),
    };
    let res = backend.health_check().await;

    assert!(res.is_err());
}

#[tokio::test]
async fn it_lists_models() -> Result<()> {
    let body = serde_json::to_string(&ModelListResponse {
        data: vec![
            Model {
                id: "claude-b".to_string(),
            },
            Model {
                id: "claude-a".to_string(),
            },
        ],
    })?;

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/models")
        .match_header("x-api-key", "abc")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let res = backend.list_models().await?;
    mock.assert_async().await;

    assert_eq!(res, vec!["claude-a".to_string(), "claude-b".to_string()]);
    return Ok(());
}

#[tokio::test]
async fn it_falls_back_to_presets_when_listing_fails() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/models")
        .with_status(401)
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let res = backend.list_models().await?;
    mock.assert_async().await;

    assert_eq!(res[0], "claude-sonnet-4-20250514");
    return Ok(());
}

#[tokio::test]
async fn it_gets_completions() -> Result<()> {
    let body = [
        "event: message_start\ndata: {\"type\":\"message_start\"}\n".to_string(),
        delta("thinking_delta", "6 times 7")?,
        delta("thinking_delta", " is 42.")?,
        delta("text_delta", "The answer")?,
        delta("text_delta", " is 42.")?,
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n".to_string(),
        delta("text_delta", "ignored")?,
    ]
    .join("\n");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "abc")
        .match_header("content-type", "application/json")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "claude-3-5-sonnet-20241022",
            "system": "Be brief.",
            "max_tokens": 1024,
            "top_k": 250,
            "stream": true,
            "messages": [
                { "role": "user", "content": "Hi" },
                { "role": "user", "content": "What is 6 x 7?" },
            ],
        })))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let backend = Anthropic::with_url(server.url());
    backend.get_completion(prompt(), &tx).await?;

    mock.assert_async().await;

    assert_eq!(
        to_fragments(rx.recv().await)?,
        vec![Fragment::Reasoning("6 times 7".to_string())]
    );
    assert_eq!(
        to_fragments(rx.recv().await)?,
        vec![Fragment::Reasoning(" is 42.".to_string())]
    );
    assert_eq!(
        to_fragments(rx.recv().await)?,
        vec![Fragment::Text("The answer".to_string())]
    );
    assert_eq!(
        to_fragments(rx.recv().await)?,
        vec![Fragment::Text(" is 42.".to_string())]
    );
    assert!(matches!(rx.recv().await, Some(Event::BackendDone())));

    return Ok(());
}

#[tokio::test]
async fn it_fails_on_stream_error_events() -> Result<()> {
    let body = [
        delta("text_delta", "Partial")?,
        "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n".to_string(),
    ]
    .join("\n");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let backend = Anthropic::with_url(server.url());
    let res = backend.get_completion(prompt(), &tx).await;
    mock.assert_async().await;

    let err = res.unwrap_err().to_string();
    assert!(err.contains("Overloaded"));
    assert_eq!(
        to_fragments(rx.recv().await)?,
        vec![Fragment::Text("Partial".to_string())]
    );

    return Ok(());
}

#[tokio::test]
async fn it_fails_on_error_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(529)
        .create_async()
        .await;

    let (tx, _rx) = mpsc::unbounded_channel::<Event>();

    let backend = Anthropic::with_url(server.url());
    let res = backend.get_completion(prompt(), &tx).await;

    assert!(res.is_err());
    mock.assert_async().await;
}
