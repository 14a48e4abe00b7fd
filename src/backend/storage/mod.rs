//! Storage Module
//!
//! Persistence contract for pads, revisions, chat, read-only aliases,
//! authors, groups and sessions. The engine and managers depend only on the
//! `PadStore` trait; the process shares one `Arc<dyn PadStore>`.
//!
//! # Module Structure
//!
//! ```text
//! storage/
//! ├── mod.rs      - PadStore trait, records, StoreError
//! ├── memory.rs   - In-memory backend
//! ├── schema.rs   - SQL schema for SQLite and PostgreSQL
//! └── sql.rs      - sqlx backend
//! ```
//!
//! # Errors
//!
//! Lookups that miss return the named `StoreError` variants (`pad not
//! found`, `pad revision not found`, ...) so callers can branch on them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::shared::apool::PoolJson;
use crate::shared::atext::AText;
use crate::shared::message::SavedRevision;

pub mod memory;
pub mod schema;
pub mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pad not found")]
    PadNotFound,
    #[error("pad revision not found")]
    RevisionNotFound,
    #[error("read only id not found")]
    ReadOnlyIdNotFound,
    #[error("author not found")]
    AuthorNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("group not found")]
    GroupNotFound,
    #[error("pad already exists")]
    PadAlreadyExists,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PadNotFound
                | Self::RevisionNotFound
                | Self::ReadOnlyIdNotFound
                | Self::AuthorNotFound
                | Self::SessionNotFound
                | Self::GroupNotFound
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted pad header. Revisions and chat live in their own tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadRecord {
    pub id: String,
    pub head: i64,
    pub chat_head: i64,
    pub public_status: bool,
    pub read_only_id: Option<String>,
    pub atext: AText,
    pub pool: PoolJson,
    pub saved_revisions: Vec<SavedRevision>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One committed changeset. Keyframe revisions also carry the full
/// attributed text and pool after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub pad_id: String,
    pub rev: i64,
    pub changeset: String,
    pub atext: Option<AText>,
    pub pool: Option<PoolJson>,
    pub author_id: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionMeta {
    pub rev: i64,
    pub timestamp: i64,
}

/// A chat line. `user_name` is filled from the author table on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub pad_id: String,
    pub seq: i64,
    pub text: String,
    pub author_id: Option<String>,
    pub time: i64,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: String,
    pub name: Option<String>,
    pub color_id: String,
    pub timestamp: i64,
    pub token: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub group_id: String,
    pub author_id: String,
    pub valid_until: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PadSortBy {
    #[default]
    PadName,
    LastEdited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadQuery {
    pub offset: i64,
    pub limit: i64,
    pub sort_by: PadSortBy,
    pub ascending: bool,
    pub pattern: Option<String>,
}

impl Default for PadQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 12,
            sort_by: PadSortBy::PadName,
            ascending: true,
            pattern: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PadListEntry {
    pub padname: String,
    pub last_edited: i64,
    pub revision_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadPage {
    pub total: i64,
    pub pads: Vec<PadListEntry>,
}

/// Backend-agnostic persistence
#[async_trait]
pub trait PadStore: Send + Sync {
    // Pads
    async fn does_pad_exist(&self, pad_id: &str) -> StoreResult<bool>;
    /// Fails with `PadAlreadyExists` when the id is taken.
    async fn create_pad(&self, pad: &PadRecord) -> StoreResult<()>;
    /// Replaces an existing pad header; `PadNotFound` if there is none.
    async fn save_pad(&self, pad: &PadRecord) -> StoreResult<()>;
    async fn get_pad(&self, pad_id: &str) -> StoreResult<PadRecord>;
    async fn get_pad_ids(&self) -> StoreResult<Vec<String>>;
    /// Removes the pad with its revisions, chat and read-only aliases.
    async fn remove_pad(&self, pad_id: &str) -> StoreResult<()>;
    async fn query_pad(&self, query: &PadQuery) -> StoreResult<PadPage>;

    // Revisions
    /// `PadNotFound` when the pad header is missing.
    async fn save_revision(&self, revision: &RevisionRecord) -> StoreResult<()>;
    async fn get_revision(&self, pad_id: &str, rev: i64) -> StoreResult<RevisionRecord>;
    /// Inclusive and contiguous; any gap is `RevisionNotFound`.
    async fn get_revisions(&self, pad_id: &str, start: i64, end: i64) -> StoreResult<Vec<RevisionRecord>>;
    async fn remove_revision(&self, pad_id: &str, rev: i64) -> StoreResult<()>;
    async fn remove_revisions_of_pad(&self, pad_id: &str) -> StoreResult<()>;
    async fn get_pad_meta_data(&self, pad_id: &str, rev: i64) -> StoreResult<RevisionMeta>;
    async fn get_pad_ids_of_author(&self, author_id: &str) -> StoreResult<Vec<String>>;

    // Chat
    /// `PadNotFound` when the pad header is missing.
    async fn save_chat_message(&self, message: &ChatRecord) -> StoreResult<()>;
    async fn save_chat_head_of_pad(&self, pad_id: &str, head: i64) -> StoreResult<()>;
    /// Inclusive range joined with author display names.
    async fn get_chats_of_pad(&self, pad_id: &str, start: i64, end: i64) -> StoreResult<Vec<ChatRecord>>;
    async fn get_author_ids_of_pad_chats(&self, pad_id: &str) -> StoreResult<Vec<String>>;
    async fn remove_chat(&self, pad_id: &str) -> StoreResult<()>;

    // Read-only aliases
    /// Writes both directions. Keeps an existing alias for the pad.
    async fn set_read_only_id(&self, pad_id: &str, read_only_id: &str) -> StoreResult<()>;
    async fn get_readonly_pad(&self, pad_id: &str) -> StoreResult<String>;
    async fn get_pad_by_read_only_id(&self, read_only_id: &str) -> StoreResult<String>;

    // Authors
    async fn save_author(&self, author: &AuthorRecord) -> StoreResult<()>;
    async fn get_author(&self, author_id: &str) -> StoreResult<AuthorRecord>;
    async fn get_authors(&self, author_ids: &[String]) -> StoreResult<Vec<AuthorRecord>>;
    async fn get_author_by_token(&self, token: &str) -> StoreResult<String>;
    async fn set_author_by_token(&self, token: &str, author_id: &str) -> StoreResult<()>;
    async fn save_author_name(&self, author_id: &str, name: &str) -> StoreResult<()>;
    async fn save_author_color(&self, author_id: &str, color: &str) -> StoreResult<()>;

    // Groups and sessions
    async fn save_group(&self, group: &GroupRecord) -> StoreResult<()>;
    async fn remove_group(&self, group_id: &str) -> StoreResult<()>;
    async fn get_group(&self, group_id: &str) -> StoreResult<GroupRecord>;
    async fn set_session_by_id(&self, session: &SessionRecord) -> StoreResult<()>;
    async fn get_session_by_id(&self, session_id: &str) -> StoreResult<SessionRecord>;
    async fn remove_session_by_id(&self, session_id: &str) -> StoreResult<()>;

    // Cookie sessions
    async fn get_cookie_session(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set_cookie_session(&self, key: &str, value: &str, expires_at: i64) -> StoreResult<()>;
    async fn delete_cookie_session(&self, key: &str) -> StoreResult<()>;
    /// Returns the number of sessions removed.
    async fn cleanup_expired_cookie_sessions(&self, now: i64) -> StoreResult<u64>;
    async fn reset_cookie_sessions(&self) -> StoreResult<()>;
}

pub type SharedStore = Arc<dyn PadStore>;

/// Case-insensitive substring match used by `query_pad`.
pub(crate) fn matches_pattern(pad_id: &str, pattern: Option<&str>) -> bool {
    match pattern {
        None => true,
        Some(p) if p.is_empty() => true,
        Some(p) => pad_id.to_lowercase().contains(&p.to_lowercase()),
    }
}
