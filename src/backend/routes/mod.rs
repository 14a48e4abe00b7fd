//! Route Configuration Module
//!
//! HTTP and WebSocket routes for the pad server.
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs            - Module exports and documentation
//! ├── router.rs         - Main router creation
//! ├── socket_routes.rs  - WebSocket upgrade handlers
//! └── api_routes.rs     - Health and stats endpoints
//! ```
//!
//! # Routes
//!
//! - `GET /socket.io`, `GET /ws` - WebSocket upgrade. Every pad message,
//!   from `CLIENT_READY` to `USER_CHANGES` and chat, travels on this socket.
//! - `GET /health` - Liveness probe
//! - `GET /stats` - `{totalPads, totalUsers, activePads}`
//!
//! All routes share `AppState`; handlers extract the `CollabEngine` from it.

/// Main router creation
pub mod router;

/// WebSocket upgrade routes
pub mod socket_routes;

/// Health and stats routes
pub mod api_routes;

pub use router::create_router;
