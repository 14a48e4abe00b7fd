/**
 * Server Initialization
 *
 * Builds the Axum application: opens the pad store, creates the
 * collaboration engine, wires the routes and starts the periodic cleanup
 * task.
 */
use axum::Router;
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::collab::CollabEngine;
use crate::backend::error::BackendError;
use crate::backend::routes::create_router;
use crate::backend::server::config::load_store;
use crate::backend::server::state::AppState;
use crate::shared::AppConfig;

/// Interval between rate limiter and cookie session sweeps
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Create the Axum application
///
/// # Initialization Steps
///
/// 1. Validate the configuration
/// 2. Open the configured pad store
/// 3. Create the collaboration engine
/// 4. Start the periodic cleanup task
/// 5. Build the router
///
/// # Errors
///
/// Fails when the configuration is invalid or the database is unreachable.
pub async fn create_app(config: AppConfig) -> Result<Router, BackendError> {
    let engine = create_engine(config).await?;
    // Step 5: Router
    Ok(build_app(engine))
}

/// Steps 1 to 4 of `create_app`. The binary keeps the engine so it can
/// close every socket on shutdown.
pub async fn create_engine(config: AppConfig) -> Result<CollabEngine, BackendError> {
    // Step 1: Reject bad settings before touching the database
    config
        .validate()
        .map_err(|e| BackendError::state(e.to_string()))?;

    // Step 2: Open storage
    let store = load_store(&config).await?;

    // Step 3: Engine owns pads, authors, sessions and the socket hub
    let engine = CollabEngine::new(config, store);
    info!(
        "[Server] Engine ready (keyframe interval {})",
        engine.config().keyframe_interval
    );

    // Step 4: Periodic cleanup
    spawn_cleanup(engine.clone());

    Ok(engine)
}

/// Router over an existing engine.
pub fn build_app(engine: CollabEngine) -> Router {
    create_router(AppState::new(engine))
}

fn spawn_cleanup(engine: CollabEngine) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            engine.cleanup().await;
            debug!("[Server] Periodic cleanup ran");
        }
    });
}
