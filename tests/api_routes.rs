//! HTTP API tests driven through the router without a listener.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use session_notification_hub::config::{ApiConfig, JwtConfig, ServerConfig, Settings, WebSocketConfig};
use session_notification_hub::connection_manager::ConnectionHandle;
use session_notification_hub::server::{create_app, AppState};

const API_KEY: &str = "test-api-key";

fn test_state(api_key: Option<&str>) -> AppState {
    AppState::new(Settings {
        server: ServerConfig::default(),
        jwt: JwtConfig {
            secret: "api-test-secret".to_string(),
            issuer: None,
            audience: None,
        },
        api: ApiConfig {
            key: api_key.map(str::to_string),
        },
        websocket: WebSocketConfig::default(),
    })
}

fn connect(state: &AppState, user_id: &str) -> (Arc<ConnectionHandle>, mpsc::Receiver<Bytes>) {
    let (handle, rx) = ConnectionHandle::new(user_id, 8);
    state.hub.register(handle.clone());
    (handle, rx)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post(uri: &str, api_key: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_health_reports_connections() {
    let state = test_state(None);
    let (_handle, _rx) = connect(&state, "u1");
    let app = create_app(state);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["users"], 1);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let state = test_state(None);
    let (_handle, _rx) = connect(&state, "u1");
    state.hub.broadcast_to_user("u1", "hello");
    let app = create_app(state);

    let request = Request::builder().uri("/stats").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_connections"], 1);
    assert_eq!(body["total_delivered"], 1);
    assert!(body["max_idle_seconds"].is_u64());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_app(test_state(None));

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&body).contains("hub_connections_total"));
}

#[tokio::test]
async fn test_logout_endpoint_requires_api_key() {
    let state = test_state(Some(API_KEY));
    let (_handle, mut rx) = connect(&state, "u1");
    let app = create_app(state);

    let (status, body) = send(app.clone(), post("/api/v1/users/u1/logout", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(app.clone(), post("/api/v1/users/u1/logout", Some("wrong"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(rx.try_recv().is_err());

    let (status, body) = send(app, post("/api/v1/users/u1/logout", Some(API_KEY), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], 1);
    assert_eq!(
        rx.try_recv().unwrap(),
        Bytes::from_static(br#"{"type":"logout","message":"Logged in from another device"}"#)
    );
}

#[tokio::test]
async fn test_push_message_to_user() {
    let state = test_state(None);
    let (_a, mut rx_a) = connect(&state, "u1");
    let (_b, mut rx_b) = connect(&state, "u2");
    let app = create_app(state);

    let payload = json!({"type": "order_status", "order_id": 42, "status": "paid"});
    let (status, body) = send(
        app,
        post("/api/v1/users/u1/messages", None, Some(payload.clone())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["delivered"], 1);
    assert_eq!(body["evicted"], 0);

    let received: Value = serde_json::from_slice(&rx_a.try_recv().unwrap()).unwrap();
    assert_eq!(received, payload);
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_push_to_offline_user_is_not_an_error() {
    let app = create_app(test_state(None));

    let (status, body) = send(
        app,
        post("/api/v1/users/nobody/messages", None, Some(json!({"hello": "world"}))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], 0);
}

#[tokio::test]
async fn test_push_null_body_is_rejected() {
    let app = create_app(test_state(None));

    let (status, body) = send(
        app,
        post("/api/v1/users/u1/messages", None, Some(Value::Null)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
