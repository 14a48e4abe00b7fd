//! Engine and storage fixtures
//!
//! `TestClient` stands in for a socket: it owns the receiving end of the
//! hub queue and pushes frames straight into `CollabEngine::handle_frame`.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use xfpad::backend::collab::CollabEngine;
use xfpad::backend::realtime::Outbound;
use xfpad::backend::storage::{MemoryStore, SharedStore, SqlStore};
use xfpad::shared::AppConfig;

const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Config for engine tests: empty default text, limiter off.
pub fn test_config() -> AppConfig {
    AppConfig::builder()
        .default_pad_text("")
        .load_test(true)
        .build()
        .expect("valid test config")
}

pub fn test_engine() -> CollabEngine {
    engine_with(test_config())
}

pub fn engine_with(config: AppConfig) -> CollabEngine {
    CollabEngine::new(config, Arc::new(MemoryStore::new()))
}

/// A SQLite store in a fresh temp directory. Keep the `TempDir` alive for
/// as long as the store is used.
pub async fn temp_sqlite_store() -> (TempDir, SharedStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("xfpad.db").display());
    let store = SqlStore::connect_sqlite(&url).await.expect("sqlite store");
    (dir, Arc::new(store))
}

/// `COLLABROOM` subtype, top-level type, `disconnect`, or `accessStatus`.
pub fn frame_kind(frame: &Value) -> String {
    if frame.get("disconnect").is_some() {
        return "disconnect".to_string();
    }
    if frame.get("accessStatus").is_some() {
        return "accessStatus".to_string();
    }
    match frame["type"].as_str() {
        Some("COLLABROOM") => frame["data"]["type"].as_str().unwrap_or_default().to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

pub fn client_ready(pad_id: &str, token: &str, name: &str) -> Value {
    json!({
        "type": "CLIENT_READY",
        "component": "pad",
        "padId": pad_id,
        "token": token,
        "userInfo": {"name": name}
    })
}

pub fn reconnect_ready(pad_id: &str, token: &str, client_rev: i64) -> Value {
    json!({
        "type": "CLIENT_READY",
        "padId": pad_id,
        "token": token,
        "userInfo": {},
        "reconnect": true,
        "client_rev": client_rev
    })
}

pub fn user_changes(base_rev: i64, changeset: &str) -> Value {
    json!({
        "type": "COLLABROOM",
        "data": {
            "type": "USER_CHANGES",
            "baseRev": base_rev,
            "changeset": changeset,
            "apool": {"numToAttrib": {}, "nextNum": 0}
        }
    })
}

pub fn collab(data: Value) -> Value {
    json!({"type": "COLLABROOM", "data": data})
}

pub struct TestClient {
    pub id: String,
    engine: CollabEngine,
    rx: mpsc::Receiver<Outbound>,
}

impl TestClient {
    pub async fn connect(engine: &CollabEngine, id: &str, ip: &str) -> Self {
        let rx = engine.connect(id, ip).await;
        Self {
            id: id.to_string(),
            engine: engine.clone(),
            rx,
        }
    }

    /// Connects and completes the CLIENT_READY handshake, returning CLIENT_VARS.
    pub async fn join(engine: &CollabEngine, id: &str, pad_id: &str, token: &str) -> (Self, Value) {
        let mut client = Self::connect(engine, id, "127.0.0.1").await;
        assert!(client.send(client_ready(pad_id, token, id)).await);
        let vars = client.expect("CLIENT_VARS").await;
        (client, vars)
    }

    pub async fn send(&self, frame: Value) -> bool {
        self.engine.handle_frame(&self.id, &frame.to_string()).await
    }

    pub async fn next(&mut self) -> Option<Outbound> {
        tokio::time::timeout(FRAME_TIMEOUT, self.rx.recv())
            .await
            .unwrap_or_else(|_| panic!("{}: no frame within {:?}", self.id, FRAME_TIMEOUT))
    }

    pub async fn next_json(&mut self) -> Value {
        match self.next().await {
            Some(Outbound::Text(text)) => serde_json::from_str(&text).expect("server sent JSON"),
            other => panic!("{}: expected a text frame, got {:?}", self.id, other),
        }
    }

    /// Skips frames until one of `kind` arrives.
    pub async fn expect(&mut self, kind: &str) -> Value {
        loop {
            let frame = self.next_json().await;
            if frame_kind(&frame) == kind {
                return frame;
            }
        }
    }

    /// Drains until the hub closes this client.
    pub async fn expect_closed(&mut self) {
        loop {
            match self.next().await {
                Some(Outbound::Close) | None => return,
                Some(Outbound::Text(_)) => {}
            }
        }
    }

    /// True when nothing arrives within `wait`.
    pub async fn is_quiet(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.rx.recv()).await.is_err()
    }
}
