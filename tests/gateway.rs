// Router end to end, with a local axum app standing in for ARMIE

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    routing::post,
};
use clap::Parser;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

use armie_gateway::config::Args;
use armie_gateway::handlers::router;
use armie_gateway::models::{RATE_LIMITED_MESSAGE, RateLimitedBody};
use armie_gateway::state::AppState;

// Fake upstream that echoes what it received
async fn start_upstream() -> String {
    async fn echo(headers: HeaderMap, body: Bytes) -> Json<Value> {
        Json(json!({
            "forwarded_for": headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok()),
            "body": String::from_utf8_lossy(&body),
        }))
    }

    let app = Router::new()
        .route("/api/auth/signin", post(echo))
        .route("/api/auth/signup", post(echo))
        .route("/api/upload", post(echo));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake upstream");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake upstream failed");
    });
    format!("http://{}", addr)
}

// Upstream that promises 100 bytes, sends 5 and hangs up
async fn start_truncating_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind truncating upstream");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept failed");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(6).any(|w| w == b"\r\n\r\n{}") {
            let n = socket.read(&mut buf).await.expect("read failed");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nshort")
            .await
            .expect("write failed");
        let _ = socket.shutdown().await;
    });
    format!("http://{}", addr)
}

fn gateway(upstream: &str, extra: &[&str]) -> (Router, Arc<AppState>) {
    let mut argv = vec!["armie-gateway", "--upstream", upstream];
    argv.extend_from_slice(extra);
    let args = Args::parse_from(argv);
    let state = Arc::new(AppState::from_args(&args).expect("valid test config"));
    (router(Arc::clone(&state)), state)
}

fn post_from(path: &str, ip: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("x-forwarded-for", ip)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn sixth_signin_is_rejected() {
    let upstream = start_upstream().await;
    let (app, _) = gateway(&upstream, &[]);

    for n in 1..=5u32 {
        let response = app
            .clone()
            .oneshot(post_from("/api/auth/signin", "203.0.113.9", r#"{"email":"a@b.c"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            (5 - n).to_string().as_str()
        );

        let body = json_body(response).await;
        assert_eq!(body["forwarded_for"], "203.0.113.9");
        assert_eq!(body["body"], r#"{"email":"a@b.c"}"#);
    }

    let response = app
        .clone()
        .oneshot(post_from("/api/auth/signin", "203.0.113.9", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    assert!(response.headers().contains_key("retry-after"));

    let body: RateLimitedBody = serde_json::from_value(json_body(response).await).unwrap();
    assert_eq!(body.error, RATE_LIMITED_MESSAGE);
    assert_eq!(body.limit, 5);
    assert_eq!(body.remaining, 0);
}

#[tokio::test]
async fn other_clients_and_actions_keep_their_quota() {
    let upstream = start_upstream().await;
    let (app, _) = gateway(&upstream, &["--signin-limit", "1"]);

    let first = app
        .clone()
        .oneshot(post_from("/api/auth/signin", "198.51.100.1", "{}"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let again = app
        .clone()
        .oneshot(post_from("/api/auth/signin", "198.51.100.1", "{}"))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_client = app
        .clone()
        .oneshot(post_from("/api/auth/signin", "198.51.100.2", "{}"))
        .await
        .unwrap();
    assert_eq!(other_client.status(), StatusCode::OK);

    let other_action = app
        .clone()
        .oneshot(post_from("/api/auth/signup", "198.51.100.1", "{}"))
        .await
        .unwrap();
    assert_eq!(other_action.status(), StatusCode::OK);
    assert_eq!(other_action.headers()["x-ratelimit-limit"], "3");
}

#[tokio::test]
async fn clearing_store_readmits_client() {
    let upstream = start_upstream().await;
    let (app, state) = gateway(&upstream, &["--upload-limit", "1"]);

    app.clone()
        .oneshot(post_from("/api/upload", "192.0.2.4", "cover.png"))
        .await
        .unwrap();
    let limited = app
        .clone()
        .oneshot(post_from("/api/upload", "192.0.2.4", "cover.png"))
        .await
        .unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);

    state.limiter.clear();

    let readmitted = app
        .oneshot(post_from("/api/upload", "192.0.2.4", "cover.png"))
        .await
        .unwrap();
    assert_eq!(readmitted.status(), StatusCode::OK);
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    // nothing listens on port 9 locally
    let (app, _) = gateway("http://127.0.0.1:9", &["--upstream-timeout", "2"]);

    let response = app
        .oneshot(post_from("/api/contracts", "192.0.2.8", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "9");
}

#[tokio::test]
async fn health_reports_tracked_keys() {
    let upstream = start_upstream().await;
    let (app, _) = gateway(&upstream, &[]);

    app.clone()
        .oneshot(post_from("/api/auth/signup", "192.0.2.1", "{}"))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["tracked_keys"], 1);
}

#[tokio::test]
async fn metrics_expose_decisions() {
    let upstream = start_upstream().await;
    let (app, _) = gateway(&upstream, &["--signup-limit", "1"]);

    for _ in 0..2 {
        app.clone()
            .oneshot(post_from("/api/auth/signup", "192.0.2.77", "{}"))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("armie_rate_limit_decisions_total"));
    assert!(text.contains(r#"outcome="limited""#));
}

#[tokio::test]
async fn oversized_body_is_413_json_and_spends_no_quota() {
    let upstream = start_upstream().await;
    let (app, state) = gateway(&upstream, &["--max-body-bytes", "4"]);

    let response = app
        .clone()
        .oneshot(post_from("/api/upload", "192.0.2.50", "0123456789"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.headers()["content-type"], "application/json");

    let body = json_body(response).await;
    assert_eq!(body["error"], "request body exceeds 4 bytes");
    assert!(state.limiter.is_empty());

    // a body within the limit still goes through
    let ok = app
        .oneshot(post_from("/api/upload", "192.0.2.50", "tiny"))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(ok.headers()["x-ratelimit-remaining"], "19");
}

#[tokio::test]
async fn truncated_upstream_body_is_bad_gateway() {
    let upstream = start_truncating_upstream().await;
    let (app, _) = gateway(&upstream, &["--upstream-timeout", "5"]);

    let response = app
        .oneshot(post_from("/api/auth/signin", "192.0.2.60", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "4");

    let body = json_body(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("failed to read upstream response body"));
}
