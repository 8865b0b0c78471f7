//! Integration tests for the control API: the seam through which the
//! external UI/state layer drives the bridge and observes its status.

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;
use viaduct_bridge::{ConnectionBridge, EndpointResolver};
use viaduct_engine::{EngineRuntime, EngineSettings, InstanceRegistry};
use viaduct_host::{app, AppState};

/// Starts a fake proxy that accepts WebSocket upgrades and holds each
/// connection open until the client closes it.
async fn spawn_proxy() -> SocketAddr {
    let app = Router::new().route(
        "/",
        get(|upgrade: WebSocketUpgrade| async move {
            upgrade.on_upgrade(|mut socket| async move {
                while let Some(Ok(_)) = socket.recv().await {}
            })
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn setup_app(engine_enabled: bool, override_url: Option<&str>, data_dir: &Path) -> Router {
    let runtime = engine_enabled.then(|| {
        EngineRuntime::new(data_dir, EngineSettings::default())
    });
    let registry = Arc::new(InstanceRegistry::new(runtime));

    let resolver = EndpointResolver::new("proxy.test", false).unwrap();
    let resolver = match override_url {
        Some(url) => resolver.with_override(url).unwrap(),
        None => resolver,
    };

    let bridge = Arc::new(ConnectionBridge::new(registry.clone(), resolver));
    app(AppState { registry, bridge })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(true, None, dir.path());

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn engine_version_reports_the_runtime_build() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(true, None, dir.path());

    let response = app.oneshot(get_request("/api/engine/version")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let version = json["version"].as_str().expect("version should be a string");
    assert!(!version.is_empty());
}

#[tokio::test]
async fn engine_version_without_runtime_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(false, None, dir.path());

    let response = app.oneshot(get_request("/api/engine/version")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("runtime"));
}

#[tokio::test]
async fn connect_with_invalid_identifier_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(true, None, dir.path());

    let response = app
        .oneshot(post_json(
            "/api/bridge/connect",
            json!({ "database_id": "Not Valid!" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn connect_without_runtime_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(false, None, dir.path());

    let response = app
        .oneshot(post_json(
            "/api/bridge/connect",
            json!({ "database_id": "db-abc" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn connect_with_unreachable_proxy_is_bad_gateway() {
    // Bind a port, then free it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let unreachable = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(true, Some(&unreachable), dir.path());

    let response = app
        .oneshot(post_json(
            "/api/bridge/connect",
            json!({ "database_id": "db-abc" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn connect_status_disconnect_round_trip() {
    let proxy = spawn_proxy().await;
    let proxy_url = format!("ws://{}", proxy);

    let dir = tempfile::tempdir().unwrap();
    let app = setup_app(true, Some(&proxy_url), dir.path());

    // Initially disconnected.
    let response = app
        .clone()
        .oneshot(get_request("/api/bridge/status"))
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["state"], "closed");
    assert_eq!(status["database_id"], Value::Null);

    // Connect.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/bridge/connect",
            json!({ "database_id": "db-abc" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    assert_eq!(status["state"], "open");
    assert_eq!(status["database_id"], "db-abc");
    assert!(status["connected_at"].is_string());

    // Status reflects the open connection.
    let response = app
        .clone()
        .oneshot(get_request("/api/bridge/status"))
        .await
        .unwrap();
    let status = body_json(response).await;
    assert_eq!(status["state"], "open");

    // Disconnect, twice: second call is a harmless no-op.
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_empty("/api/bridge/disconnect"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        assert_eq!(status["state"], "closed");
        assert_eq!(status["database_id"], Value::Null);
        assert_eq!(status["connected_at"], Value::Null);
    }
}
