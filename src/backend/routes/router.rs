/**
 * Router Configuration
 *
 * Combines the socket and API routes into a single Axum router.
 *
 * # Route Order
 *
 * 1. Socket routes (WebSocket upgrade)
 * 2. API routes (health, stats)
 * 3. Fallback handler (404)
 */
use axum::http::StatusCode;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::backend::error::BackendError;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::routes::socket_routes::configure_socket_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
///
/// # Arguments
///
/// * `app_state` - Application state holding the collaboration engine
///
/// # Route Details
///
/// ## Socket Routes
///
/// - `GET /socket.io` - WebSocket upgrade into the hub
/// - `GET /ws` - Same, for plain WebSocket clients
///
/// ## API Routes
///
/// - `GET /health` - `{"status":"ok"}`
/// - `GET /stats` - `{totalPads, totalUsers, activePads}`
///
/// ## Fallback
///
/// Unknown routes return a JSON 404.
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = configure_socket_routes(Router::new());
    let router = configure_api_routes(router);

    let router = router.fallback(|| async {
        BackendError::handler(StatusCode::NOT_FOUND, "404 Not Found")
    });

    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}
