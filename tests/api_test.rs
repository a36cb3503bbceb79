// Integration tests for the status API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use zigbridge::api::{create_router, ApiState};
use zigbridge::bridge::Bridge;
use zigbridge::clients::{ClientRegistry, ClientsConfig};
use zigbridge::engine::{DecisionEngine, EngineConfig};
use zigbridge::inventory::DeviceDirectory;

struct TestApp {
    router: Router,
    bridge: Bridge,
    _dir: TempDir,
}

fn create_test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let clients = Arc::new(ClientRegistry::load(&ClientsConfig {
        data_file: dir.path().join("clients.json"),
    }));
    let directory = Arc::new(DeviceDirectory::new());
    let engine = Arc::new(DecisionEngine::new(EngineConfig::default()));

    let router = create_router(ApiState {
        engine: engine.clone(),
        clients: clients.clone(),
        directory: directory.clone(),
    });
    let bridge = Bridge::new("zigbee2mqtt", engine, directory, clients);

    TestApp {
        router,
        bridge,
        _dir: dir,
    }
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    let (status, body) = get_json(app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_stats_reflect_traffic() {
    let app = create_test_app();
    let topic = "zigbee2mqtt/ground/kitchen/plug";

    app.bridge.handle(topic, br#"{"state":"ON"}"#);
    app.bridge.handle(topic, br#"{"state":"ON"}"#);
    app.bridge.handle("zigbee2mqtt/ground/hall/sensor/get", b"");

    let (status, body) = get_json(app.router, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notified"], 1);
    assert_eq!(body["suppressed"], 1);
    assert_eq!(body["queries_registered"], 1);
    assert_eq!(body["change_cache_entries"], 1);
    assert_eq!(body["pending_queries"], 1);
}

#[tokio::test]
async fn test_clients_listed() {
    let app = create_test_app();
    app.bridge.handle("client/con_ip", b"panel/10.0.0.7");

    let (status, body) = get_json(app.router, "/api/clients").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["panel"], "10.0.0.7");
}

#[tokio::test]
async fn test_devices_not_found_before_inventory() {
    let app = create_test_app();
    let (status, body) = get_json(app.router, "/api/devices").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_devices_after_inventory() {
    let app = create_test_app();
    let list = br#"[
        {"friendly_name": "zigbee2mqtt/kitchen/lamp", "type": "Router", "supported": true, "brightness": 120},
        {"friendly_name": "Coordinator", "type": "Coordinator", "supported": false}
    ]"#;
    app.bridge.handle("zigbee2mqtt/bridge/devices", list);

    let (status, body) = get_json(app.router, "/api/devices").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_devices"], 1);
    assert_eq!(body["devices"][0]["device_type"], "dimmer");
    assert_eq!(body["known_rooms"], serde_json::json!(["kitchen"]));
}
