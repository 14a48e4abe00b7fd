//! Pad Module
//!
//! The in-memory pad model, the manager that caches and persists pads, and
//! the read-only alias manager.
//!
//! # Module Structure
//!
//! ```text
//! pad/
//! ├── mod.rs       - PadError, pad id validation, text cleaning
//! ├── model.rs     - Pad: revisions, chat head, saved revisions
//! ├── manager.rs   - PadManager: cache, creation, persistence
//! └── readonly.rs  - Read-only id aliases
//! ```

use thiserror::Error;

use crate::backend::storage::StoreError;
use crate::shared::error::ChangesetError;

pub mod manager;
pub mod model;
pub mod readonly;

pub use manager::PadManager;
pub use model::Pad;
pub use readonly::ReadOnlyManager;

/// Maximum characters of text accepted when creating a pad
pub const MAX_PAD_TEXT_LEN: usize = 100_000;

#[derive(Debug, Error)]
pub enum PadError {
    #[error("invalid pad id: {0}")]
    InvalidPadId(String),
    #[error("text too long: {0} characters")]
    TextTooLong(usize),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid changeset: {0}")]
    InvalidChangeset(#[from] ChangesetError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid range {start}..={end} (head {head})")]
    InvalidRange { start: i64, end: i64, head: i64 },
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl PadError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StoreError> for PadError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            Self::NotFound(err.to_string())
        } else if matches!(err, StoreError::PadAlreadyExists) {
            Self::Conflict(err.to_string())
        } else {
            Self::Storage(err)
        }
    }
}

pub type PadResult<T> = Result<T, PadError>;

/// Checks `^(g.[a-zA-Z0-9]{16}\$)?[^$]{1,50}$`.
pub fn is_valid_pad_id(id: &str) -> bool {
    let name = match id.split_once('$') {
        Some((group, name)) => {
            let chars: Vec<char> = group.chars().collect();
            let group_ok = chars.len() == 18 && chars[0] == 'g' && chars[2..].iter().all(|c| c.is_ascii_alphanumeric());
            if !group_ok {
                return false;
            }
            name
        }
        None => id,
    };
    let len = name.chars().count();
    (1..=50).contains(&len) && !name.contains('$')
}

/// Replaces whitespace and colons with `_` and collapses runs of `_`.
pub fn sanitize_pad_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        let c = if c.is_whitespace() || c == ':' { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Normalises line endings, tabs and non-breaking spaces.
pub fn clean_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', "    ")
        .replace('\u{a0}', " ")
}
