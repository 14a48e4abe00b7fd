/**
 * Socket Route Handlers
 *
 * WebSocket endpoints. The upgrade hands the socket to
 * `realtime::serve_socket`, which registers it with the hub and feeds its
 * frames to the collaboration engine.
 *
 * # Routes
 *
 * - `GET /socket.io` - WebSocket upgrade
 * - `GET /ws` - WebSocket upgrade (alias)
 */
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tracing::debug;

use crate::backend::collab::CollabEngine;
use crate::backend::realtime::serve_socket;
use crate::backend::server::state::AppState;

/// Configure socket routes
///
/// Adds `GET /socket.io` and `GET /ws`. Both need the router to be served
/// with `into_make_service_with_connect_info::<SocketAddr>()` so the peer
/// address is available for rate limiting.
pub fn configure_socket_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/socket.io", get(handle_socket_upgrade))
        .route("/ws", get(handle_socket_upgrade))
}

async fn handle_socket_upgrade(
    ws: WebSocketUpgrade,
    State(engine): State<CollabEngine>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let ip = addr.ip().to_string();
    debug!("[Server] WebSocket upgrade from {}", log_ip(&engine, &ip));
    ws.on_upgrade(move |socket| serve_socket(socket, engine, ip))
}

fn log_ip<'a>(engine: &CollabEngine, ip: &'a str) -> &'a str {
    if engine.config().disable_ip_logging {
        "ANONYMOUS"
    } else {
        ip
    }
}
