//! Realtime Module
//!
//! The WebSocket side of the server: the hub that owns every client's
//! outbound queue, and the per-socket reader and writer tasks.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs     - Module exports and documentation
//! ├── hub.rs     - Client registry, bounded outbound queues, eviction
//! └── client.rs  - Socket pumps: ping/pong, frame reads, engine hand-off
//! ```

pub mod client;
pub mod hub;

pub use client::serve_socket;
pub use hub::{Hub, Outbound};
