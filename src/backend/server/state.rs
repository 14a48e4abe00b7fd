/**
 * Application State
 *
 * `AppState` is the Axum state shared by every handler. It holds the
 * collaboration engine, which owns the pad manager, the WebSocket hub and
 * the per-pad mailboxes, plus the loaded configuration.
 *
 * `FromRef` lets handlers extract just the engine or just the config.
 *
 * # Example
 *
 * ```rust,no_run
 * use axum::extract::State;
 * use xfpad::backend::collab::CollabEngine;
 *
 * async fn handler(State(engine): State<CollabEngine>) {
 *     let _ = engine.stats().await;
 * }
 * ```
 */
use axum::extract::FromRef;
use std::sync::Arc;

use crate::backend::collab::CollabEngine;
use crate::shared::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub engine: CollabEngine,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(engine: CollabEngine) -> Self {
        let config = Arc::new(engine.config().clone());
        Self { engine, config }
    }
}

impl FromRef<AppState> for CollabEngine {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
