//! Router-level contract tests: webhook deliveries in, envelope JSON and
//! status codes out. The engine underneath runs on in-memory backends.

use std::sync::Arc;

use api::{AppState, router};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use llm_service::{LlmClient, ScriptedLlm};
use review_engine::{
    FakeScm, ReviewEngine, ScmClient,
    config::{
        ConfigSnapshot, LlmSection, ReviewSection, RuntimeSection, ScmSection, ScoringWeights,
    },
};
use serde_json::{Value, json};
use tower::ServiceExt;

const REPO: &str = "acme/widgets";
const PR: u64 = 7;

fn snapshot(secret: Option<&str>) -> Arc<ConfigSnapshot> {
    let snapshot = ConfigSnapshot {
        scm: ScmSection {
            url: "https://gitea.example.com".to_string(),
            token: "t0ken".to_string(),
            context_window: 3,
            webhook_secret: secret.map(str::to_string),
        },
        llm: LlmSection {
            model: "deepseek/deepseek-chat".to_string(),
            api_key: "sk-test".to_string(),
            endpoint: "https://api.deepseek.com".to_string(),
            max_tokens: 8_000,
            temperature: 0.2,
        },
        review: ReviewSection {
            quality_threshold: 8.5,
            ignore_patterns: Vec::new(),
            scoring_rules: ScoringWeights {
                security: 0.3,
                performance: 0.2,
                readability: 0.2,
                best_practice: 0.3,
            },
        },
        runtime: RuntimeSection::default(),
    };
    snapshot.validate().expect("test snapshot valid");
    Arc::new(snapshot)
}

fn app(secret: Option<&str>) -> Router {
    let engine = ReviewEngine::with_clients(
        snapshot(secret),
        ScmClient::Fake(FakeScm::new()),
        LlmClient::Scripted(ScriptedLlm::new()),
    );
    router(Arc::new(AppState::new(engine)))
}

fn payload(action: &str, sha: &str) -> Vec<u8> {
    json!({
        "action": action,
        "pull_request": { "number": PR, "head": { "sha": sha } },
        "repository": { "full_name": REPO }
    })
    .to_string()
    .into_bytes()
}

async fn post_webhook(app: Router, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/gitea")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

#[tokio::test]
async fn fresh_delivery_queues_and_repeat_is_a_duplicate() {
    let app = app(None);

    let (status, body) = post_webhook(app.clone(), payload("opened", "feedc0ffee")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("queued"));
    assert_eq!(body["data"]["key"], json!("acme/widgets#7@feedc0ffee"));

    let (status, body) = post_webhook(app, payload("opened", "feedc0ffee")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("duplicate"));
    assert_eq!(body["data"]["key"], json!("acme/widgets#7@feedc0ffee"));
}

#[tokio::test]
async fn non_trigger_action_is_acknowledged_and_ignored() {
    let (status, body) = post_webhook(app(None), payload("closed", "feedc0ffee")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("ignored"));
    assert!(body["data"].get("key").is_none(), "ignored ack has no key");
}

#[tokio::test]
async fn malformed_payload_points_at_the_missing_field() {
    let body = json!({
        "action": "opened",
        "pull_request": { "number": PR, "head": {} },
        "repository": { "full_name": REPO }
    })
    .to_string()
    .into_bytes();

    let (status, body) = post_webhook(app(None), body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!("UNPROCESSABLE"));
    assert_eq!(body["error"]["field"], json!("pull_request.head.sha"));
}

#[tokio::test]
async fn missing_signature_is_rejected_when_a_secret_is_set() {
    let (status, body) = post_webhook(app(Some("s3cret")), payload("opened", "feedc0ffee")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!("UNAUTHORIZED"));
}

#[tokio::test]
async fn health_route_reports_ok() {
    let request = Request::builder()
        .method("GET")
        .uri("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app(None).oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value: Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(value["status"], json!("ok"));
}
