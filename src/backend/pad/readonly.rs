//! Read-only aliases: `r.` followed by 32 lowercase hex characters.

use rand::RngCore;
use std::sync::Arc;
use tracing::debug;

use crate::backend::pad::{PadError, PadManager, PadResult};
use crate::backend::storage::StoreError;

pub struct ReadOnlyManager {
    pads: Arc<PadManager>,
}

pub fn is_read_only_id(id: &str) -> bool {
    id.starts_with("r.")
}

pub fn generate_read_only_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("r.{}", hex::encode(bytes))
}

impl ReadOnlyManager {
    pub fn new(pads: Arc<PadManager>) -> Self {
        Self { pads }
    }

    /// Returns the pad's alias, minting and storing one on first use.
    pub async fn get_read_only_id(&self, pad_id: &str) -> PadResult<String> {
        let store = self.pads.store();
        match store.get_readonly_pad(pad_id).await {
            Ok(id) => return Ok(id),
            Err(StoreError::ReadOnlyIdNotFound) => {}
            Err(err) => return Err(err.into()),
        }

        // A concurrent caller may have won; the store keeps the first alias.
        store.set_read_only_id(pad_id, &generate_read_only_id()).await?;
        let id = store.get_readonly_pad(pad_id).await?;
        if let Some(pad) = self.pads.get_loaded(pad_id).await {
            pad.write().await.read_only_id = Some(id.clone());
        }
        debug!("[Pad] Read-only id minted for {}", pad_id);
        Ok(id)
    }

    pub async fn get_pad_id(&self, read_only_id: &str) -> PadResult<String> {
        match self.pads.store().get_pad_by_read_only_id(read_only_id).await {
            Ok(pad_id) => Ok(pad_id),
            Err(StoreError::ReadOnlyIdNotFound) => Err(PadError::not_found("pad not found")),
            Err(err) => Err(err.into()),
        }
    }
}
