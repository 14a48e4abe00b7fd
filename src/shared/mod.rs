//! Shared Module
//!
//! Platform-agnostic types used by the server and by anything that speaks
//! the pad protocol: the changeset algebra, attribute pools, attributed
//! text, wire messages, errors and configuration.
//!
//! # Overview
//!
//! Nothing here touches the network or a database, so the whole module
//! builds without the `ssr` feature.

/// Attribute pool
pub mod apool;

/// Attributed text
pub mod atext;

/// Changeset algebra
pub mod changeset;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Pad wire protocol
pub mod message;

/// Re-export commonly used types for convenience
pub use apool::{Attribute, AttributePool, PoolJson};
pub use atext::AText;
pub use config::{AppConfig, AppConfigBuilder, ConfigError, DbType, RateLimitConfig};
pub use error::{ChangesetError, SharedError};
pub use message::{ClientMessage, CollabRoomMessage, CollabRoomOut, ServerFrame, ServerMessage};
