//! HTTP routes

use axum::http::StatusCode;
use axum_test::TestServer;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use xfpad::backend::server::build_app;

use crate::assert_ok;
use crate::common::fixtures::test_engine;

#[tokio::test]
async fn test_health() {
    let server = assert_ok!(TestServer::new(build_app(test_engine())));
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({"status": "ok"}));
}

#[tokio::test]
async fn test_stats_counts_pads() {
    let engine = test_engine();
    assert_ok!(engine.pads().get_pad("first", None, None).await);
    assert_ok!(engine.pads().get_pad("second", None, None).await);
    let server = assert_ok!(TestServer::new(build_app(engine)));

    let response = server.get("/stats").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({"totalPads": 2, "totalUsers": 0, "activePads": 0})
    );
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = assert_ok!(TestServer::new(build_app(test_engine())));
    let response = server.get("/nope").expect_failure().await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["status"], 404);
}

#[tokio::test]
async fn test_create_app_rejects_invalid_config() {
    let mut config = xfpad::shared::AppConfig::default();
    config.outbound_buffer = 0;
    let err = xfpad::backend::server::create_app(config).await.err().expect("invalid config");
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}
