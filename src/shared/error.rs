//! Shared Error Types
//!
//! `ChangesetError` is raised by the changeset algebra whether the changeset
//! was built locally or decoded from a client. `SharedError` wraps it along
//! with the wire-level failures: bad JSON, invalid fields and frames the
//! protocol cannot interpret.
//!
//! ```rust
//! use xfpad::shared::error::{ChangesetError, SharedError};
//!
//! let err: SharedError = ChangesetError::invalid("not in canonical form").into();
//! assert_eq!(err.to_string(), "Invalid changeset: not in canonical form");
//! ```
use thiserror::Error;

/// Errors raised by the changeset algebra
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChangesetError {
    /// The changeset violates its own representation invariants
    #[error("Invalid changeset: {reason}")]
    InvalidChangeset {
        /// What was wrong with it
        reason: String,
    },

    /// The changeset was applied to a text of the wrong length
    #[error("mismatched apply: {actual} / {expected}")]
    LengthMismatch {
        /// Length the changeset expects
        expected: usize,
        /// Length of the text it was applied to
        actual: usize,
    },

    /// An `*N` marker has no entry in the attribute pool
    #[error("attribute {0} not found in pool")]
    UnknownAttribute(usize),

    /// An operation string could not be parsed
    #[error("invalid operation: {0}")]
    MalformedOp(String),
}

impl ChangesetError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidChangeset {
            reason: reason.into(),
        }
    }
}

/// Protocol-level failures
#[derive(Debug, Error, Clone)]
pub enum SharedError {
    /// JSON could not be encoded or decoded
    #[error("Serialization error: {message}")]
    SerializationError {
        message: String,
    },

    /// A field was present but unacceptable
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// Wire name of the field
        field: String,
        message: String,
    },

    /// The frame does not follow the protocol
    #[error("Message error: {message}")]
    MessageError {
        message: String,
    },

    /// Changeset algebra error
    #[error(transparent)]
    Changeset(#[from] ChangesetError),
}

impl SharedError {
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::MessageError {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
