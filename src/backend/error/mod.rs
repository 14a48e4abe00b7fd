//! Backend Error Module
//!
//! The HTTP-facing error type. Pad, storage and engine errors convert into
//! `BackendError`, which renders as a JSON body with a matching status code.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - BackendError and its status mapping
//! └── conversion.rs - From impls and IntoResponse
//! ```
//!
//! # Status Mapping
//!
//! | Error | Status |
//! |-------|--------|
//! | not found (pad, revision, author, alias, session) | 404 |
//! | pad already exists | 409 |
//! | invalid pad id, changeset or input | 400 |
//! | commit rate exceeded | 429 |
//! | storage and state failures | 500 |

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::BackendError;
