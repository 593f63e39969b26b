//! Gateway credential refresh and retry, against a mock gateway

mod common;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use bhelper::config::GatewayConfig;
use bhelper::error::BhError;
use bhelper::llm::gateway::{AuthState, GatewayClient};
use bhelper::llm::{LlmClient, PromptMode, TransformRequest};
use bhelper::store::{StateStore, CREDENTIAL_KEY};
use common::http::spawn_server;
use common::log_capture::capture_logs;
use common::mock_notifier::RecordingNotifier;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
enum Reply {
    Answer,
    Status(u16),
    Garbage,
}

#[derive(Clone)]
struct MockGateway {
    script: Arc<Mutex<VecDeque<Reply>>>,
    sign_in_ok: bool,
    completions: Arc<AtomicUsize>,
    sign_ins: Arc<AtomicUsize>,
    auth_headers: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl MockGateway {
    fn new(script: &[Reply], sign_in_ok: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.iter().copied().collect())),
            sign_in_ok,
            completions: Arc::new(AtomicUsize::new(0)),
            sign_ins: Arc::new(AtomicUsize::new(0)),
            auth_headers: Arc::new(Mutex::new(Vec::new())),
            bodies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    fn sign_ins(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }

    fn last_auth(&self) -> String {
        self.auth_headers.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

async fn completion(
    State(gw): State<MockGateway>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    gw.completions.fetch_add(1, Ordering::SeqCst);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    gw.auth_headers.lock().unwrap().push(auth);
    gw.bodies.lock().unwrap().push(body);

    let reply = gw.script.lock().unwrap().pop_front().unwrap_or(Reply::Answer);
    match reply {
        Reply::Answer => (
            StatusCode::OK,
            json!({"answer": {"content": "```markdown\nHello, world.\n```"}}).to_string(),
        ),
        Reply::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            json!({"error": "ticket rejected"}).to_string(),
        ),
        Reply::Garbage => (StatusCode::OK, json!({"unexpected": true}).to_string()),
    }
}

async fn sign_in(State(gw): State<MockGateway>, headers: HeaderMap) -> Json<Value> {
    let n = gw.sign_ins.fetch_add(1, Ordering::SeqCst) + 1;
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(auth.contains("intuit_appid=app-1"));

    if gw.sign_in_ok {
        Json(json!({
            "data": {
                "identityTestSignInWithPassword": {
                    "accessToken": format!("fresh-token-{n}"),
                    "legacyAuthId": "4242"
                }
            }
        }))
    } else {
        Json(json!({"data": {"errors": [{"message": "invalid credentials"}]}}))
    }
}

async fn setup(gw: &MockGateway, dir: &TempDir) -> (GatewayConfig, Arc<StateStore>) {
    let app = Router::new()
        .route("/completion", post(completion))
        .route("/signin", post(sign_in))
        .with_state(gw.clone());
    let base = spawn_server(app).await;

    let config = GatewayConfig {
        completion_url: format!("{base}/completion"),
        signin_url: format!("{base}/signin"),
        app_id: "app-1".to_string(),
        app_secret: "secret-1".to_string(),
        username: "user".to_string(),
        password: "pass".to_string(),
        ..Default::default()
    };
    let store = Arc::new(StateStore::open(dir.path().join("state.json")).unwrap());
    (config, store)
}

fn request() -> TransformRequest {
    TransformRequest::new("helo wrld", PromptMode::Prefixed)
}

#[tokio::test]
async fn test_expired_ticket_is_refreshed_once() {
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Status(401), Reply::Answer], true);
    let (config, store) = setup(&gw, &dir).await;
    let notifier = Arc::new(RecordingNotifier::new());

    let client = GatewayClient::new(&config, store.clone(), notifier.clone()).unwrap();
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);

    let result = client.send_text(&request()).await.unwrap();
    assert_eq!(result, "Hello, world.");
    assert_eq!(gw.completions(), 2);
    assert_eq!(gw.sign_ins(), 1);
    assert!(gw.last_auth().contains("intuit_token=fresh-token-1"));
    assert!(gw.last_auth().contains("intuit_userid=4242"));

    // The first refresh is silent
    assert!(notifier.messages().is_empty());
    assert!(store.get(CREDENTIAL_KEY).unwrap().contains("fresh-token-1"));
    assert!(matches!(client.auth_state(), AuthState::Authenticated(_)));
}

#[tokio::test]
async fn test_persistent_rejection_stops_after_three_calls() {
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Status(401); 5], true);
    let (config, store) = setup(&gw, &dir).await;
    let notifier = Arc::new(RecordingNotifier::new());

    let client = GatewayClient::new(&config, store, notifier.clone()).unwrap();
    let err = client.send_text(&request()).await.unwrap_err();

    assert!(matches!(err, BhError::RetriesExhausted { attempts: 3 }));
    assert_eq!(gw.completions(), 3);
    // No sign-in after the final rejection
    assert_eq!(gw.sign_ins(), 2);
    assert_eq!(notifier.messages(), vec!["Token expired, retrying...".to_string()]);
}

#[tokio::test]
async fn test_forbidden_is_treated_like_unauthorized() {
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Status(403), Reply::Answer], true);
    let (config, store) = setup(&gw, &dir).await;

    let client = GatewayClient::new(&config, store, Arc::new(RecordingNotifier::new())).unwrap();
    assert_eq!(client.send_text(&request()).await.unwrap(), "Hello, world.");
    assert_eq!(gw.sign_ins(), 1);
}

#[tokio::test]
async fn test_sign_in_failure_aborts_the_call() {
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Status(401)], false);
    let (config, store) = setup(&gw, &dir).await;

    let notifier = Arc::new(RecordingNotifier::new());
    let client = GatewayClient::new(&config, store.clone(), notifier).unwrap();
    let err = client.send_text(&request()).await.unwrap_err();

    match &err {
        BhError::SignIn { error, details } => {
            assert_eq!(error, "API Error");
            assert_eq!(details.as_deref(), Some("invalid credentials"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.user_message().contains("invalid credentials"));
    assert_eq!(gw.completions(), 1);
    assert_eq!(client.auth_state(), AuthState::Unauthenticated);
    assert!(store.get(CREDENTIAL_KEY).is_none());
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Status(500)], true);
    let (config, store) = setup(&gw, &dir).await;

    let client = GatewayClient::new(&config, store, Arc::new(RecordingNotifier::new())).unwrap();
    let err = client.send_text(&request()).await.unwrap_err();

    assert!(matches!(err, BhError::Status { status: 500, .. }));
    assert_eq!(err.user_message(), "API request failed with status code: 500");
    assert_eq!(gw.completions(), 1);
    assert_eq!(gw.sign_ins(), 0);
}

#[tokio::test]
async fn test_unexpected_answer_shape_is_malformed() {
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Garbage], true);
    let (config, store) = setup(&gw, &dir).await;

    let client = GatewayClient::new(&config, store, Arc::new(RecordingNotifier::new())).unwrap();
    let err = client.send_text(&request()).await.unwrap_err();
    assert!(matches!(err, BhError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_saved_ticket_survives_restart() {
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Status(401), Reply::Answer, Reply::Answer], true);
    let (config, store) = setup(&gw, &dir).await;

    let first = GatewayClient::new(&config, store, Arc::new(RecordingNotifier::new())).unwrap();
    first.send_text(&request()).await.unwrap();
    drop(first);

    // Reopen the store from disk, as a restarted daemon would
    let reopened = Arc::new(StateStore::open(dir.path().join("state.json")).unwrap());
    let second = GatewayClient::new(&config, reopened, Arc::new(RecordingNotifier::new())).unwrap();
    match second.auth_state() {
        AuthState::Authenticated(credential) => {
            assert_eq!(credential.access_token, "fresh-token-1");
            assert_eq!(credential.legacy_auth_id, "4242");
        }
        other => panic!("expected saved ticket, got {other:?}"),
    }

    second.send_text(&request()).await.unwrap();
    assert_eq!(gw.sign_ins(), 1);
    assert!(gw.last_auth().contains("intuit_token=fresh-token-1"));
}

#[tokio::test]
async fn test_input_is_truncated_and_prefixed() {
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Answer, Reply::Answer], true);
    let (mut config, store) = setup(&gw, &dir).await;
    config.max_input_chars = 5;
    config.pre_prompt = "Rewrite:".to_string();

    let client = GatewayClient::new(&config, store, Arc::new(RecordingNotifier::new())).unwrap();
    client
        .send_text(&TransformRequest::new("ünïcödé text", PromptMode::Prefixed))
        .await
        .unwrap();
    client
        .send_text(&TransformRequest::new("ünïcödé text", PromptMode::Direct))
        .await
        .unwrap();

    let bodies = gw.bodies.lock().unwrap().clone();
    let content = |i: usize| {
        bodies[i]
            .pointer("/llm_params/messages/0/content")
            .and_then(Value::as_str)
            .unwrap()
            .to_string()
    };
    assert_eq!(content(0), "Rewrite:\nünïcö");
    assert_eq!(content(1), "ünïcö");
    assert_eq!(
        bodies[0].pointer("/llm_params/llm_configuration/model"),
        Some(&json!("gpt-4-32k"))
    );
}

#[tokio::test]
async fn test_fresh_ticket_is_not_logged() {
    let (logs, _guard) = capture_logs();
    let dir = TempDir::new().unwrap();
    let gw = MockGateway::new(&[Reply::Status(401), Reply::Answer], true);
    let (config, store) = setup(&gw, &dir).await;

    let client = GatewayClient::new(&config, store, Arc::new(RecordingNotifier::new())).unwrap();
    client.send_text(&request()).await.unwrap();

    let output = logs.contents();
    assert!(output.contains("Token API responded 200"));
    assert!(!output.contains("fresh-token-1"));
    assert!(!output.contains("secret-1"));
}
