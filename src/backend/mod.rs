//! Backend Module
//!
//! Server-side code for xfpad, compiled only with the `ssr` feature.
//!
//! # Architecture
//!
//! - **`storage`** - `PadStore` contract with in-memory and SQL backends
//! - **`pad`** - Pad model, `PadManager` cache and read-only aliases
//! - **`author`** - Authors, tokens and the color palette
//! - **`ratelimit`** - Per-IP sliding-window commit limiter
//! - **`collab`** - `CollabEngine`: handshake, commit pipeline, fan-out
//! - **`realtime`** - WebSocket hub and per-client reader/writer tasks
//! - **`routes`** - Axum routes
//! - **`server`** - Application state and startup
//! - **`error`** - HTTP-facing error type
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs      - Module exports and documentation
//! ├── main.rs     - Server binary
//! ├── storage/    - Persistence backends
//! ├── pad/        - Pads and the pad manager
//! ├── author/     - Author manager
//! ├── ratelimit/  - Commit rate limiter
//! ├── collab/     - Collaboration engine
//! ├── realtime/   - Socket hub
//! ├── routes/     - Route configuration
//! ├── server/     - Server initialization and state
//! └── error/      - Error types
//! ```
//!
//! # Request Flow
//!
//! A socket frame is read by the client task in `realtime`, decoded and
//! dispatched by `CollabEngine`. Writes to a pad are queued on that pad's
//! mailbox so each pad has a single writer. Replies and broadcasts go back
//! out through the `Hub`, one bounded channel per client.

/// Persistence backends
#[cfg(feature = "ssr")]
pub mod storage;

/// Pads, pad manager and read-only aliases
#[cfg(feature = "ssr")]
pub mod pad;

/// Author identity
#[cfg(feature = "ssr")]
pub mod author;

/// Commit rate limiting
#[cfg(feature = "ssr")]
pub mod ratelimit;

/// Collaboration engine
#[cfg(feature = "ssr")]
pub mod collab;

/// WebSocket hub and client tasks
#[cfg(feature = "ssr")]
pub mod realtime;

/// Route configuration
#[cfg(feature = "ssr")]
pub mod routes;

/// Server setup and state
#[cfg(feature = "ssr")]
pub mod server;

/// Backend error types
#[cfg(feature = "ssr")]
pub mod error;

#[cfg(feature = "ssr")]
pub use collab::CollabEngine;
#[cfg(feature = "ssr")]
pub use error::BackendError;
#[cfg(feature = "ssr")]
pub use server::create_app;
