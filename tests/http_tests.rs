mod common;

use anyhow::Result;
use assistant_relay::{create_router, AppState, SessionConfig};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::Engine;
use common::{Call, MockClient};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

fn app(client: &Arc<MockClient>) -> Router {
    create_router(AppState::new(
        client.clone(),
        SessionConfig::new("asst_docs", "Docs Helper"),
    ))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Vec<u8>)> {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

async fn call_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let (status, bytes) = call(app, method, uri, body).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

async fn start(app: &Router) -> Result<String> {
    let (status, body) = call_json(app, Method::POST, "/sessions", None).await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(body["session_id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let client = MockClient::new();
    let (status, body) = call(&app(&client), Method::GET, "/health", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
    Ok(())
}

#[tokio::test]
async fn test_start_session_returns_greeting() -> Result<()> {
    let client = MockClient::new();
    let (status, body) = call_json(&app(&client), Method::POST, "/sessions", None).await?;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["thread_id"], "thread_1");
    assert_eq!(body["transcript"][0]["role"], "assistant");
    assert_eq!(body["transcript"][0]["content"], "Hello, I'm Docs Helper!");
    assert!(Uuid::parse_str(body["session_id"].as_str().unwrap_or_default()).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_start_session_remote_failure() -> Result<()> {
    let client = MockClient::new();
    client.fail_create_thread.store(true, Ordering::SeqCst);

    let (status, body) = call_json(&app(&client), Method::POST, "/sessions", None).await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("could not start the conversation"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_session_not_found() -> Result<()> {
    let client = MockClient::new();
    let app = app(&client);
    let missing = Uuid::new_v4();

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/sessions/{}/messages", missing),
        Some(json!({ "content": "hello" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap_or_default().contains("not found"));

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/sessions/{}/status", missing),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_send_message_streams_response() -> Result<()> {
    let client = MockClient::new();
    client.push_run(common::completed_run(
        "run_1",
        "msg_1",
        &["Returns are accepted", " within 30 days."],
    ));
    let app = app(&client);
    let session_id = start(&app).await?;

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/sessions/{}/messages", session_id),
        Some(json!({
            "content": "What is the refund policy?",
            "elements": [{ "name": "receipt.txt", "content": "cmVjZWlwdA==" }]
        })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["thread_id"], "thread_1");
    assert_eq!(body["attachments"], 1);
    assert_eq!(body["outcome"]["run_id"], "run_1");
    assert_eq!(body["outcome"]["status"]["status"], "completed");
    assert_eq!(
        body["outcome"]["messages"][0]["text"],
        "Returns are accepted within 30 days."
    );
    assert!(client.calls().contains(&Call::UploadFile {
        filename: "receipt.txt".to_string(),
        size: 7,
    }));

    let (status, transcript) = call_json(
        &app,
        Method::GET,
        &format!("/sessions/{}/transcript", session_id),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let turns = transcript.as_array().map(Vec::len).unwrap_or_default();
    assert_eq!(turns, 3);
    assert_eq!(transcript[1]["role"], "user");
    assert_eq!(transcript[2]["content"], "Returns are accepted within 30 days.");

    Ok(())
}

#[tokio::test]
async fn test_element_path_from_client_is_ignored() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let secret = dir.path().join("secret.txt");
    std::fs::write(&secret, b"server-only contents")?;

    let client = MockClient::new();
    let app = app(&client);
    let session_id = start(&app).await?;

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/sessions/{}/messages", session_id),
        Some(json!({
            "content": "Read this",
            "elements": [{ "name": "notes.txt", "path": secret.to_string_lossy() }]
        })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attachments"], 0);
    assert_eq!(body["upload_failures"][0]["name"], "notes.txt");
    assert!(body["upload_failures"][0]["reason"]
        .as_str()
        .unwrap_or_default()
        .contains("no content"));
    assert!(!client
        .calls()
        .iter()
        .any(|c| matches!(c, Call::UploadFile { .. })));

    let (_, transcript) = call_json(
        &app,
        Method::GET,
        &format!("/sessions/{}/transcript", session_id),
        None,
    )
    .await?;
    assert!(transcript[1]["elements"][0].get("path").is_none());

    Ok(())
}

#[tokio::test]
async fn test_send_message_append_failure() -> Result<()> {
    let client = MockClient::new();
    client.fail_append.store(true, Ordering::SeqCst);
    let app = app(&client);
    let session_id = start(&app).await?;

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/sessions/{}/messages", session_id),
        Some(json!({ "content": "hello" })),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    Ok(())
}

#[tokio::test]
async fn test_voice_turn_over_http() -> Result<()> {
    let client = MockClient::new();
    client.set_transcription("Where is my order?");
    let app = app(&client);
    let session_id = start(&app).await?;
    let audio_uri = format!("/sessions/{}/audio", session_id);

    let first = base64::engine::general_purpose::STANDARD.encode([1u8; 6]);
    let (status, body) = call_json(
        &app,
        Method::POST,
        &audio_uri,
        Some(json!({ "is_start": true, "mime_type": "audio/webm", "data": first })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["buffered_bytes"], 6);

    let second = base64::engine::general_purpose::STANDARD.encode([2u8; 4]);
    let (_, body) = call_json(
        &app,
        Method::POST,
        &audio_uri,
        Some(json!({ "data": second })),
    )
    .await?;
    assert_eq!(body["buffered_bytes"], 10);

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("{}/end", audio_uri),
        Some(json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcription"], "Where is my order?");
    assert!(client.calls().contains(&Call::Transcribe {
        filename: "input_audio.webm".to_string(),
        size: 10,
    }));

    Ok(())
}

#[tokio::test]
async fn test_audio_chunk_invalid_base64() -> Result<()> {
    let client = MockClient::new();
    let app = app(&client);
    let session_id = start(&app).await?;

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/sessions/{}/audio", session_id),
        Some(json!({ "is_start": true, "mime_type": "audio/webm", "data": "not base64!" })),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_audio_end_with_empty_capture() -> Result<()> {
    let client = MockClient::new();
    let app = app(&client);
    let session_id = start(&app).await?;
    let audio_uri = format!("/sessions/{}/audio", session_id);

    let (status, _) = call(
        &app,
        Method::POST,
        &audio_uri,
        Some(json!({ "is_start": true, "mime_type": "audio/webm", "data": "" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("{}/end", audio_uri),
        Some(json!({})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "audio capture ended without any audio");
    assert!(!client
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Transcribe { .. })));

    Ok(())
}

#[tokio::test]
async fn test_audio_end_without_capture() -> Result<()> {
    let client = MockClient::new();
    let app = app(&client);
    let session_id = start(&app).await?;

    let (status, body) = call_json(
        &app,
        Method::POST,
        &format!("/sessions/{}/audio/end", session_id),
        Some(json!({})),
    )
    .await?;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "no audio capture in progress");
    Ok(())
}

#[tokio::test]
async fn test_event_stream_is_sse() -> Result<()> {
    let client = MockClient::new();
    let app = app(&client);
    let session_id = start(&app).await?;

    let request = Request::builder()
        .uri(format!("/sessions/{}/events", session_id))
        .body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    Ok(())
}

#[tokio::test]
async fn test_session_released_when_last_listener_leaves() -> Result<()> {
    let client = MockClient::new();
    let app = app(&client);
    let session_id = start(&app).await?;
    let status_uri = format!("/sessions/{}/status", session_id);

    let events = |app: &Router| {
        let request = Request::builder()
            .uri(format!("/sessions/{}/events", session_id))
            .body(Body::empty());
        let app = app.clone();
        async move { Ok::<_, anyhow::Error>(app.oneshot(request?).await?) }
    };

    let first = events(&app).await?;
    let second = events(&app).await?;
    assert_eq!(first.status(), StatusCode::OK);

    drop(first);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let (status, _) = call(&app, Method::GET, &status_uri, None).await?;
    assert_eq!(status, StatusCode::OK);

    drop(second);
    let mut status = StatusCode::OK;
    for _ in 0..100 {
        status = call(&app, Method::GET, &status_uri, None).await?.0;
        if status == StatusCode::NOT_FOUND {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_end_session() -> Result<()> {
    let client = MockClient::new();
    let app = app(&client);
    let session_id = start(&app).await?;
    let session_uri = format!("/sessions/{}", session_id);

    let (status, body) = call_json(&app, Method::DELETE, &session_uri, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "closed");
    assert_eq!(body["stats"]["is_closed"], true);
    assert_eq!(body["stats"]["thread_id"], "thread_1");

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("{}/status", session_uri),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::DELETE, &session_uri, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
