//! Collaboration Module
//!
//! The realtime pad protocol: client handshakes, the commit pipeline that
//! rebases and appends incoming changesets, fan-out of new revisions, chat,
//! saved revisions and timeslider history.
//!
//! # Module Structure
//!
//! ```text
//! collab/
//! ├── mod.rs         - CollabError and exports
//! ├── engine.rs      - CollabEngine: message dispatch and commit pipeline
//! ├── mailbox.rs     - Per-pad serialized task queues
//! ├── session.rs     - Per-connection session state
//! └── timeslider.rs  - CHANGESET_REQ history composition
//! ```
//!
//! # Ordering
//!
//! Every job that mutates a pad runs on that pad's mailbox, so commits for
//! one pad are applied one at a time while different pads proceed in
//! parallel. No pad lock is held while the store is written.

use thiserror::Error;

use crate::backend::pad::PadError;
use crate::backend::ratelimit::RateLimitExceeded;
use crate::shared::error::{ChangesetError, SharedError};

pub mod engine;
pub mod mailbox;
pub mod session;
pub mod timeslider;

pub use engine::{CollabEngine, EngineStats};
pub use mailbox::Mailboxes;
pub use session::{Session, SessionStore};

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("bad changeset: {0}")]
    BadChangeset(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Changeset(#[from] ChangesetError),
    #[error(transparent)]
    Pad(#[from] PadError),
    #[error(transparent)]
    Message(#[from] SharedError),
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    #[error("pad queue for {0} stopped before the job finished")]
    QueueClosed(String),
}

impl CollabError {
    /// True when the client sent something that can never be applied.
    pub fn is_bad_changeset(&self) -> bool {
        matches!(
            self,
            Self::BadChangeset(_) | Self::Changeset(_) | Self::Pad(PadError::InvalidChangeset(_))
        )
    }
}

pub type CollabResult<T> = Result<T, CollabError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::StoreError;

    #[test]
    fn test_bad_changeset_classification() {
        assert!(CollabError::BadChangeset("x".into()).is_bad_changeset());
        assert!(CollabError::from(ChangesetError::invalid("x")).is_bad_changeset());
        assert!(CollabError::from(PadError::InvalidChangeset(ChangesetError::invalid("x"))).is_bad_changeset());
        assert!(!CollabError::from(PadError::from(StoreError::PadNotFound)).is_bad_changeset());
        assert!(!CollabError::InvalidRequest("x".into()).is_bad_changeset());
    }
}
