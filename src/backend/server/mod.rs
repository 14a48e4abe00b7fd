//! Server Module
//!
//! Initialization of the Axum server.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs     - Module exports and documentation
//! ├── state.rs   - AppState and FromRef implementations
//! ├── config.rs  - Pad store selection (memory, SQLite, PostgreSQL)
//! └── init.rs    - App creation and background tasks
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Configuration**: `AppConfig` is validated
//! 2. **Storage**: the store named by `db_type` is opened and its schema created
//! 3. **Engine**: `CollabEngine` is built over the store
//! 4. **Router**: routes are configured with the shared `AppState`
//! 5. **Background Tasks**: a cleanup sweep runs every five minutes
//!
//! # Example
//!
//! ```rust,no_run
//! use xfpad::backend::server::create_app;
//! use xfpad::shared::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_app(AppConfig::load()?).await?;
//! # Ok(())
//! # }
//! ```

/// Application state and FromRef implementations
pub mod state;

/// Storage selection
pub mod config;

/// Server initialization
pub mod init;

pub use init::{build_app, create_app, create_engine};
pub use state::AppState;
