//! Author Module
//!
//! Authors are identified by `a.` plus 16 base62 characters and are bound
//! to client tokens (`t.` plus a base64 payload). Each author gets a
//! palette color derived from a hash of its id.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::backend::pad::{PadError, PadResult};
use crate::backend::storage::{AuthorRecord, SharedStore, StoreError};

/// The 64 colors handed out to authors and sent to clients as `colorPalette`.
pub const PALETTE: [&str; 64] = [
    "#ffc7c7", "#fff1c7", "#e3ffc7", "#c7ffd5", "#c7ffff", "#c7d5ff", "#e3c7ff", "#ffc7f1",
    "#ffa8a8", "#ffe699", "#cfff9e", "#99ffb3", "#a3ffff", "#99b3ff", "#cc99ff", "#ff99e5",
    "#e7b1b1", "#e9dcaf", "#cde9af", "#bfedcc", "#b1e7e7", "#c3cdee", "#d2b8ea", "#eec3e6",
    "#e9cece", "#e7e0ca", "#d3e5c7", "#bce1c5", "#c1e2e2", "#c1c9e2", "#cfc1e2", "#e0bdd9",
    "#baded3", "#a0f8eb", "#b1e7e0", "#c3c8e4", "#cec5e2", "#b1d5e7", "#cda8f0", "#f0f0a8",
    "#f2f2a6", "#f5a8eb", "#c5f9a9", "#ececbb", "#e7c4bc", "#daf0b2", "#b0a0fd", "#bce2e7",
    "#cce2bb", "#ec9afe", "#edabbd", "#aeaeea", "#c4e7b1", "#d722bb", "#f3a5e7", "#ffa8a8",
    "#d8c0c5", "#eaaedd", "#adc6eb", "#bedad1", "#dee9af", "#e9afc2", "#f8d2a0", "#b3b3e6",
];

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_author_id() -> String {
    format!("a.{}", random_alphanumeric(16))
}

pub fn generate_token() -> String {
    format!("t.{}", random_alphanumeric(20))
}

/// Checks `^t\.[A-Za-z0-9+/]+={0,2}$`.
pub fn is_valid_token(token: &str) -> bool {
    let Some(payload) = token.strip_prefix("t.") else {
        return false;
    };
    let body = payload.trim_end_matches('=');
    let padding = payload.len() - body.len();
    !body.is_empty()
        && padding <= 2
        && body.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
}

/// Checks `^#(?:[0-9A-F]{3}){1,2}$`, ignoring case.
pub fn is_valid_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Palette color for `author_id`, stable across restarts.
pub fn color_for(author_id: &str) -> &'static str {
    let digest = Sha256::digest(author_id.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    PALETTE[(u64::from_be_bytes(head) % PALETTE.len() as u64) as usize]
}

pub struct AuthorManager {
    store: SharedStore,
}

impl AuthorManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create_author(&self, name: Option<&str>) -> PadResult<AuthorRecord> {
        let id = generate_author_id();
        let now = chrono::Utc::now().timestamp_millis();
        let author = AuthorRecord {
            color_id: color_for(&id).to_string(),
            id,
            name: name.map(str::to_string),
            timestamp: now,
            token: None,
            created_at: now,
        };
        self.store.save_author(&author).await?;
        debug!("[Author] Created author {}", author.id);
        Ok(author)
    }

    /// The author bound to `token`, minting and binding one if none is.
    pub async fn get_author_for_token(&self, token: &str) -> PadResult<AuthorRecord> {
        match self.store.get_author_by_token(token).await {
            Ok(author_id) => match self.store.get_author(&author_id).await {
                Ok(author) => return Ok(author),
                Err(StoreError::AuthorNotFound) => {}
                Err(err) => return Err(err.into()),
            },
            Err(StoreError::AuthorNotFound) => {}
            Err(err) => return Err(err.into()),
        }

        let mut author = self.create_author(None).await?;
        self.store.set_author_by_token(token, &author.id).await?;
        author.token = Some(token.to_string());
        info!("[Author] Bound new author {} to token", author.id);
        Ok(author)
    }

    pub async fn get_author(&self, author_id: &str) -> PadResult<AuthorRecord> {
        Ok(self.store.get_author(author_id).await?)
    }

    pub async fn get_authors(&self, author_ids: &[String]) -> PadResult<Vec<AuthorRecord>> {
        Ok(self.store.get_authors(author_ids).await?)
    }

    pub async fn set_author_name(&self, author_id: &str, name: &str) -> PadResult<()> {
        Ok(self.store.save_author_name(author_id, name).await?)
    }

    pub async fn set_author_color(&self, author_id: &str, color: &str) -> PadResult<()> {
        if !is_valid_color(color) {
            return Err(PadError::InvalidInput(format!("invalid color {}", color)));
        }
        Ok(self.store.save_author_color(author_id, color).await?)
    }

    pub async fn get_pads_of_author(&self, author_id: &str) -> PadResult<Vec<String>> {
        Ok(self.store.get_pad_ids_of_author(author_id).await?)
    }
}
