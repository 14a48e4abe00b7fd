/**
 * Pad Manager
 *
 * Caches loaded pads and is the only writer of pad state to the store.
 * A mutation is computed under the pad's write lock, the lock is released,
 * and then the result is persisted. If persisting fails, the in-memory pad
 * is rolled back to the snapshot taken before the mutation.
 */
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::backend::pad::model::Pad;
use crate::backend::pad::{is_valid_pad_id, sanitize_pad_id, PadError, PadResult, MAX_PAD_TEXT_LEN};
use crate::backend::storage::{ChatRecord, PadPage, PadQuery, SharedStore};
use crate::shared::changeset::text::char_len;
use crate::shared::message::SavedRevision;

pub type PadHandle = Arc<RwLock<Pad>>;

fn ensure_live(pad: &Pad) -> PadResult<()> {
    if pad.is_removed() {
        return Err(PadError::not_found(format!("pad {} was removed", pad.id)));
    }
    Ok(())
}

pub struct PadManager {
    store: SharedStore,
    pads: RwLock<HashMap<String, PadHandle>>,
    load_lock: Mutex<()>,
    default_text: String,
    keyframe_interval: i64,
}

impl PadManager {
    pub fn new(store: SharedStore, default_text: impl Into<String>, keyframe_interval: i64) -> Self {
        Self {
            store,
            pads: RwLock::new(HashMap::new()),
            load_lock: Mutex::new(()),
            default_text: default_text.into(),
            keyframe_interval,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn is_valid_pad_id(&self, id: &str) -> bool {
        is_valid_pad_id(id)
    }

    pub fn sanitize_pad_id(&self, id: &str) -> String {
        sanitize_pad_id(id)
    }

    /// Returns the cached pad, loads it from the store, or creates it with
    /// `text` (or the default text) as revision 0.
    pub async fn get_pad(&self, id: &str, text: Option<&str>, author: Option<&str>) -> PadResult<PadHandle> {
        if !is_valid_pad_id(id) {
            return Err(PadError::InvalidPadId(id.to_string()));
        }
        if let Some(text) = text {
            let len = char_len(text);
            if len > MAX_PAD_TEXT_LEN {
                return Err(PadError::TextTooLong(len));
            }
        }
        if let Some(pad) = self.pads.read().await.get(id) {
            return Ok(pad.clone());
        }

        let _guard = self.load_lock.lock().await;
        if let Some(pad) = self.pads.read().await.get(id) {
            return Ok(pad.clone());
        }

        let pad = if self.store.does_pad_exist(id).await? {
            self.load(id).await?
        } else {
            let pad = Pad::create(id, text.unwrap_or(&self.default_text), author, self.keyframe_interval)?;
            self.store.create_pad(&pad.to_record()).await?;
            let rev0 = pad.get_revision(0)?;
            self.store.save_revision(rev0).await?;
            info!("[Pad] Created pad {}", id);
            pad
        };

        let handle = Arc::new(RwLock::new(pad));
        self.pads.write().await.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    async fn load(&self, id: &str) -> PadResult<Pad> {
        let record = self.store.get_pad(id).await?;
        let revisions = if record.head >= 0 {
            self.store.get_revisions(id, 0, record.head).await?
        } else {
            Vec::new()
        };
        let pad = Pad::from_record(record, revisions, self.keyframe_interval);
        pad.check()?;
        debug!("[Pad] Loaded pad {} at rev {}", id, pad.head);
        Ok(pad)
    }

    /// The cached pad, without touching the store.
    pub async fn get_loaded(&self, id: &str) -> Option<PadHandle> {
        self.pads.read().await.get(id).cloned()
    }

    pub async fn loaded_count(&self) -> usize {
        self.pads.read().await.len()
    }

    pub async fn does_pad_exist(&self, id: &str) -> PadResult<bool> {
        if self.pads.read().await.contains_key(id) {
            return Ok(true);
        }
        Ok(self.store.does_pad_exist(id).await?)
    }

    pub async fn list_all_pads(&self) -> PadResult<Vec<String>> {
        let mut ids = self.store.get_pad_ids().await?;
        ids.sort();
        Ok(ids)
    }

    pub async fn query_pads(&self, query: &PadQuery) -> PadResult<PadPage> {
        Ok(self.store.query_pad(query).await?)
    }

    pub async fn unload_pad(&self, id: &str) {
        self.pads.write().await.remove(id);
    }

    /// Deletes the pad with its revisions, chat and read-only alias. A
    /// handle still held by a caller is marked removed, so later writes
    /// through it fail with NotFound instead of recreating the pad.
    pub async fn remove_pad(&self, id: &str) -> PadResult<()> {
        let loaded = self.pads.write().await.remove(id);
        if let Some(pad) = loaded {
            pad.write().await.mark_removed();
        }
        self.store.remove_pad(id).await?;
        info!("[Pad] Removed pad {}", id);
        Ok(())
    }

    /// Runs `make_changeset` under the pad's write lock, appends its result
    /// and persists the new revision.
    async fn commit_with<F>(&self, pad: &PadHandle, author: Option<&str>, make_changeset: F) -> PadResult<i64>
    where
        F: FnOnce(&mut Pad) -> PadResult<String>,
    {
        let (rev, revision, record, snapshot) = {
            let mut guard = pad.write().await;
            ensure_live(&guard)?;
            let snapshot = guard.snapshot();
            let previous_head = guard.head;
            let cs = make_changeset(&mut *guard)?;
            let rev = guard.append_revision(&cs, author)?;
            if rev == previous_head {
                return Ok(rev);
            }
            (rev, guard.get_revision(rev)?.clone(), guard.to_record(), snapshot)
        };

        let persisted = async {
            self.store.save_revision(&revision).await?;
            self.store.save_pad(&record).await
        }
        .await;

        if let Err(err) = persisted {
            warn!("[Pad] Failed to persist rev {} of {}: {}", rev, record.id, err);
            let mut guard = pad.write().await;
            if guard.head == rev {
                guard.restore(snapshot);
            }
            return Err(err.into());
        }
        debug!(pad_id = %record.id, rev, "[Pad] Revision persisted");
        Ok(rev)
    }

    /// Appends an already rebased changeset. Returns the new head, or the
    /// current head for an identity changeset.
    pub async fn append_revision(&self, pad: &PadHandle, cs: &str, author: Option<&str>) -> PadResult<i64> {
        let cs = cs.to_string();
        self.commit_with(pad, author, move |_| Ok(cs)).await
    }

    pub async fn set_text(&self, pad: &PadHandle, text: &str, author: Option<&str>) -> PadResult<i64> {
        self.commit_with(pad, author, |pad| Ok(pad.set_text_changeset(text, author)))
            .await
    }

    pub async fn append_text(&self, pad: &PadHandle, text: &str, author: Option<&str>) -> PadResult<i64> {
        self.commit_with(pad, author, |pad| Ok(pad.append_text_changeset(text, author)))
            .await
    }

    pub async fn restore_revision(&self, pad: &PadHandle, rev: i64, author: Option<&str>) -> PadResult<i64> {
        self.commit_with(pad, author, |pad| pad.restore_revision_changeset(rev)).await
    }

    /// Stores a chat line under the next sequence number.
    pub async fn append_chat_message(
        &self,
        pad: &PadHandle,
        text: &str,
        author: Option<&str>,
        time: i64,
    ) -> PadResult<ChatRecord> {
        let record = {
            let mut guard = pad.write().await;
            ensure_live(&guard)?;
            let seq = guard.next_chat_seq();
            ChatRecord {
                pad_id: guard.id.clone(),
                seq,
                text: text.to_string(),
                author_id: author.map(str::to_string),
                time,
                user_name: None,
            }
        };

        let persisted = async {
            self.store.save_chat_message(&record).await?;
            self.store.save_chat_head_of_pad(&record.pad_id, record.seq).await
        }
        .await;

        if let Err(err) = persisted {
            warn!("[Pad] Failed to persist chat {} of {}: {}", record.seq, record.pad_id, err);
            let mut guard = pad.write().await;
            if guard.chat_head == record.seq {
                guard.chat_head -= 1;
            }
            return Err(err.into());
        }
        Ok(record)
    }

    /// Inclusive range, `0 <= start <= end <= chat_head`.
    pub async fn get_chat_messages(&self, pad: &PadHandle, start: i64, end: i64) -> PadResult<Vec<ChatRecord>> {
        let (pad_id, head) = {
            let guard = pad.read().await;
            (guard.id.clone(), guard.chat_head)
        };
        if start < 0 || start > end || end > head {
            return Err(PadError::InvalidRange { start, end, head });
        }
        Ok(self.store.get_chats_of_pad(&pad_id, start, end).await?)
    }

    pub async fn get_all_chatters(&self, pad_id: &str) -> PadResult<Vec<String>> {
        Ok(self.store.get_author_ids_of_pad_chats(pad_id).await?)
    }

    pub async fn add_saved_revision(
        &self,
        pad: &PadHandle,
        rev: i64,
        author: &str,
        label: Option<&str>,
    ) -> PadResult<SavedRevision> {
        let (saved, record) = {
            let mut guard = pad.write().await;
            ensure_live(&guard)?;
            if rev < 0 || rev > guard.head {
                return Err(PadError::InvalidRange { start: rev, end: rev, head: guard.head });
            }
            let saved = guard.add_saved_revision(rev, author, label);
            (saved, guard.to_record())
        };
        self.store.save_pad(&record).await?;
        Ok(saved)
    }

    /// Clears `dest` for a copy, failing with Conflict unless `force`.
    /// Sessions on `dest` are not kicked here; `CollabEngine::copy_pad` does that.
    async fn prepare_destination(&self, dest: &str, force: bool) -> PadResult<()> {
        if !is_valid_pad_id(dest) {
            return Err(PadError::InvalidPadId(dest.to_string()));
        }
        if self.does_pad_exist(dest).await? {
            if !force {
                return Err(PadError::Conflict(format!("destination pad {} already exists", dest)));
            }
            self.remove_pad(dest).await?;
        }
        Ok(())
    }

    /// Copies `src` to `dest` with its full history and chat.
    pub async fn copy(&self, src: &str, dest: &str, force: bool) -> PadResult<PadHandle> {
        let source = self.get_pad(src, None, None).await?;
        self.prepare_destination(dest, force).await?;

        let copy = source.read().await.copy_to(dest);
        self.store.create_pad(&copy.to_record()).await?;
        for revision in copy.revisions() {
            self.store.save_revision(revision).await?;
        }
        if copy.chat_head >= 0 {
            for mut chat in self.store.get_chats_of_pad(src, 0, copy.chat_head).await? {
                chat.pad_id = dest.to_string();
                self.store.save_chat_message(&chat).await?;
            }
        }

        info!("[Pad] Copied pad {} to {}", src, dest);
        let handle = Arc::new(RwLock::new(copy));
        self.pads.write().await.insert(dest.to_string(), handle.clone());
        Ok(handle)
    }

    /// Creates `dest` with a single revision reproducing the head of `src`.
    pub async fn copy_without_history(
        &self,
        src: &str,
        dest: &str,
        force: bool,
        author: Option<&str>,
    ) -> PadResult<PadHandle> {
        let source = self.get_pad(src, None, None).await?;
        self.prepare_destination(dest, force).await?;

        let copy = source.read().await.copy_without_history(dest, author)?;
        self.store.create_pad(&copy.to_record()).await?;
        self.store.save_revision(copy.get_revision(0)?).await?;

        info!("[Pad] Copied pad {} to {} without history", src, dest);
        let handle = Arc::new(RwLock::new(copy));
        self.pads.write().await.insert(dest.to_string(), handle.clone());
        Ok(handle)
    }
}
