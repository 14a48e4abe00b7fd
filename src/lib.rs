// Increase recursion limit for complex async operations
#![recursion_limit = "256"]

//! xfpad - Main Library
//!
//! xfpad is a real-time collaborative plain-text editor server. Clients
//! connect over a WebSocket, submit edits as changesets, and the server
//! rebases, stores and rebroadcasts them so every open copy of a pad
//! converges on the same attributed text.
//!
//! # Module Structure
//!
//! - **`shared`** - Types that compile everywhere
//!   - Changeset algebra (parse, apply, compose, follow, inverse)
//!   - Attribute pools and attributed text
//!   - Wire protocol messages
//!   - Configuration and shared error types
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Pads, pad manager, read-only aliases and authors
//!   - Storage backends (in-memory, SQLite, PostgreSQL)
//!   - Collaboration engine with a per-pad commit mailbox
//!   - WebSocket hub, routes and server bootstrap
//!
//! # Feature Flags
//!
//! - **`ssr`** - Server build (default). Enables `backend`, Axum and the
//!   tracing subscriber.
//!
//! # Usage
//!
//! ```rust,no_run
//! use xfpad::backend::server::create_app;
//! use xfpad::shared::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_app(AppConfig::default()).await?;
//! // Serve with axum::serve
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Every pad is owned by one logical writer: commits, chat and saved
//! revisions for a pad run one at a time on that pad's mailbox task, while
//! different pads proceed in parallel.

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
