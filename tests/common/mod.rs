//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - Custom assertion macros
//! - An engine harness with in-process socket clients
//! - Temporary SQLite stores

pub mod assertions;
pub mod fixtures;

pub use fixtures::*;
