//! Commit rate limiting through the engine

use pretty_assertions::assert_eq;
use xfpad::shared::AppConfig;

use crate::assert_disconnect;
use crate::common::fixtures::{client_ready, engine_with, user_changes, TestClient};

fn limited_config(load_test: bool) -> AppConfig {
    AppConfig::builder()
        .default_pad_text("")
        .rate_limit(1, 10)
        .load_test(load_test)
        .build()
        .expect("valid config")
}

async fn join_from(engine: &xfpad::backend::CollabEngine, id: &str, ip: &str, token: &str) -> TestClient {
    let mut client = TestClient::connect(engine, id, ip).await;
    assert!(client.send(client_ready("rl", token, id)).await);
    client.expect("CLIENT_VARS").await;
    client
}

#[tokio::test]
async fn test_eleventh_commit_in_a_second_disconnects() {
    let engine = engine_with(limited_config(false));
    let mut client = join_from(&engine, "s1", "10.0.0.1", "t.alice").await;

    for _ in 0..10 {
        assert!(client.send(user_changes(0, "Z:1>0$")).await);
    }
    assert!(!client.send(user_changes(0, "Z:1>0$")).await);

    assert_disconnect!(client.expect("disconnect").await, "rateLimited");
    client.expect_closed().await;
}

#[tokio::test]
async fn test_limit_is_per_ip() {
    let engine = engine_with(limited_config(false));
    let noisy = join_from(&engine, "s1", "10.0.0.1", "t.alice").await;
    let mut quiet = join_from(&engine, "s2", "10.0.0.2", "t.bob").await;

    for _ in 0..11 {
        noisy.send(user_changes(0, "Z:1>0$")).await;
    }
    assert!(quiet.send(user_changes(0, "Z:1>0$")).await);
    assert_eq!(quiet.expect("ACCEPT_COMMIT").await["data"]["newRev"], 0);
}

#[tokio::test]
async fn test_load_test_bypasses_limiter() {
    let engine = engine_with(limited_config(true));
    let client = join_from(&engine, "s1", "10.0.0.1", "t.alice").await;
    for _ in 0..20 {
        assert!(client.send(user_changes(0, "Z:1>0$")).await);
    }
}
