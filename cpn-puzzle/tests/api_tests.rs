//! HTTP routing and error mapping tests

mod helpers;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use cpn_puzzle::{build_router, AppState};
use helpers::*;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn app(completion: Option<Arc<ScriptedCompletion>>) -> (Router, AppState) {
    let service = service_with(
        Arc::new(FakeLichess::repeating(raw_puzzle("abcde", 1500))),
        Some(Arc::new(FakeDataset {
            puzzles: vec![dataset_puzzle("easy1", 1000), dataset_puzzle("mid01", 1500)],
        })),
        completion,
        vec![],
    );
    let state = AppState::new(
        Arc::new(service),
        CancellationToken::new(),
        Duration::from_secs(5),
    );
    (build_router(state.clone()), state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_at_root_and_v1() {
    let (router, _) = app(None);
    let (status, body) = get(router.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["module"], "cpn-puzzle");
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["capabilities"]["dataset"], true);
    assert_eq!(body["capabilities"]["completion"], false);
    assert!(body.get("last_error").is_none());

    let (status, _) = get(router, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_puzzle_defaults_to_medium() {
    let (router, _) = app(None);
    let (status, body) = get(router, "/api/v1/puzzle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "abcde");
    assert_eq!(body["source"], "lichess");
    assert_eq!(body["moves"][0], "f1b5");
}

#[tokio::test]
async fn test_bad_difficulty_is_400() {
    let (router, _) = app(None);
    let (status, body) = get(router, "/api/v1/puzzle?difficulty=insane").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_daily_and_by_id() {
    let (router, _) = app(None);
    let (status, body) = get(router.clone(), "/api/v1/puzzle/daily").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "daily01");

    let (status, body) = get(router.clone(), "/api/v1/puzzle/qwert").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "qwert");

    let (status, _) = get(router, "/api/v1/puzzle/zzzzz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dataset_empty_difficulty_means_any() {
    let (router, _) = app(None);
    let (status, body) = get(router, "/api/v1/puzzle/dataset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "huggingface-lichess");
}

#[tokio::test]
async fn test_ai_without_completion_is_503_and_recorded() {
    let (router, state) = app(None);
    let (status, body) = post_json(
        router,
        "/api/v1/puzzle/ai",
        r#"{"prompt": "a quiet positional idea"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    assert!(state.last_error.read().await.is_some());
}

#[tokio::test]
async fn test_ai_malformed_body_is_400() {
    let completion = Arc::new(ScriptedCompletion::always("{\"selected_index\": 0}"));
    let (router, _) = app(Some(completion));
    let (status, body) = post_json(router, "/api/v1/puzzle/ai", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_ai_selection_defaults_to_medium() {
    let completion = Arc::new(ScriptedCompletion::always("{\"selected_index\": 0}"));
    let (router, _) = app(Some(completion));
    let (status, body) = post_json(
        router,
        "/api/v1/puzzle/ai",
        r#"{"prompt": "something tactical please", "difficulty": ""}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "mid01");
    assert_eq!(body["source"], "ai-rag");
}

#[tokio::test]
async fn test_generate_exhausted_is_502() {
    let completion = Arc::new(ScriptedCompletion::always("no json here"));
    let (router, _) = app(Some(completion));
    let (status, body) = post_json(
        router,
        "/api/v1/puzzle/generate",
        r#"{"prompt": "a rook endgame trick", "difficulty": "hard"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "BAD_GATEWAY");
}

#[tokio::test]
async fn test_generate_short_prompt_is_400() {
    let completion = Arc::new(ScriptedCompletion::always(VALID_GENERATED));
    let (router, _) = app(Some(completion));
    let (status, body) = post_json(router, "/api/v1/puzzle/generate", r#"{"prompt": "mate"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("at least 8 characters"));
}
