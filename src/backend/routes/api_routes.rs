/**
 * API Route Handlers
 *
 * Plain HTTP endpoints next to the socket.
 *
 * # Routes
 *
 * - `GET /health` - Liveness probe, always `{"status":"ok"}`
 * - `GET /stats` - Pad and connection counters
 */
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::backend::collab::{CollabEngine, EngineStats};
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;

/// Configure API routes
///
/// # Returns
///
/// Router with `/health` and `/stats` configured
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/health", get(health))
        .route("/stats", get(stats))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `{totalPads, totalUsers, activePads}`
async fn stats(State(engine): State<CollabEngine>) -> Result<Json<EngineStats>, BackendError> {
    Ok(Json(engine.stats().await?))
}
