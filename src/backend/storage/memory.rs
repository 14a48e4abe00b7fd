/**
 * In-Memory Store
 *
 * Process-local backend used for development and tests. All tables sit
 * behind one `tokio::sync::RwLock`; every read hands out clones so callers
 * never alias the stored values.
 */
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::{
    matches_pattern, AuthorRecord, ChatRecord, GroupRecord, PadListEntry, PadPage, PadQuery, PadRecord, PadSortBy,
    PadStore, RevisionMeta, RevisionRecord, SessionRecord, StoreError, StoreResult,
};

#[derive(Default)]
struct Tables {
    pads: HashMap<String, PadRecord>,
    revisions: HashMap<String, BTreeMap<i64, RevisionRecord>>,
    chats: HashMap<String, BTreeMap<i64, ChatRecord>>,
    readonly2pad: HashMap<String, String>,
    pad2readonly: HashMap<String, String>,
    authors: HashMap<String, AuthorRecord>,
    token2author: HashMap<String, String>,
    groups: HashMap<String, GroupRecord>,
    sessions: HashMap<String, SessionRecord>,
    cookie_sessions: HashMap<String, (String, i64)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PadStore for MemoryStore {
    async fn does_pad_exist(&self, pad_id: &str) -> StoreResult<bool> {
        Ok(self.tables.read().await.pads.contains_key(pad_id))
    }

    async fn create_pad(&self, pad: &PadRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.pads.contains_key(&pad.id) {
            return Err(StoreError::PadAlreadyExists);
        }
        tables.pads.insert(pad.id.clone(), pad.clone());
        Ok(())
    }

    async fn save_pad(&self, pad: &PadRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let stored = tables.pads.get_mut(&pad.id).ok_or(StoreError::PadNotFound)?;
        *stored = pad.clone();
        Ok(())
    }

    async fn get_pad(&self, pad_id: &str) -> StoreResult<PadRecord> {
        self.tables
            .read()
            .await
            .pads
            .get(pad_id)
            .cloned()
            .ok_or(StoreError::PadNotFound)
    }

    async fn get_pad_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.tables.read().await.pads.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn remove_pad(&self, pad_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.pads.remove(pad_id).is_none() {
            return Err(StoreError::PadNotFound);
        }
        tables.revisions.remove(pad_id);
        tables.chats.remove(pad_id);
        if let Some(ro) = tables.pad2readonly.remove(pad_id) {
            tables.readonly2pad.remove(&ro);
        }
        Ok(())
    }

    async fn query_pad(&self, query: &PadQuery) -> StoreResult<PadPage> {
        let tables = self.tables.read().await;
        let mut entries: Vec<PadListEntry> = tables
            .pads
            .values()
            .filter(|pad| matches_pattern(&pad.id, query.pattern.as_deref()))
            .map(|pad| PadListEntry {
                padname: pad.id.clone(),
                last_edited: pad.updated_at,
                revision_number: pad.head,
            })
            .collect();
        match query.sort_by {
            PadSortBy::PadName => entries.sort_by(|a, b| a.padname.cmp(&b.padname)),
            PadSortBy::LastEdited => {
                entries.sort_by(|a, b| a.last_edited.cmp(&b.last_edited).then_with(|| a.padname.cmp(&b.padname)))
            }
        }
        if !query.ascending {
            entries.reverse();
        }
        let total = entries.len() as i64;
        let offset = query.offset.max(0) as usize;
        let limit = if query.limit > 0 { query.limit as usize } else { usize::MAX };
        let pads = entries.into_iter().skip(offset).take(limit).collect();
        Ok(PadPage { total, pads })
    }

    async fn save_revision(&self, revision: &RevisionRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.pads.contains_key(&revision.pad_id) {
            return Err(StoreError::PadNotFound);
        }
        tables
            .revisions
            .entry(revision.pad_id.clone())
            .or_default()
            .insert(revision.rev, revision.clone());
        Ok(())
    }

    async fn get_revision(&self, pad_id: &str, rev: i64) -> StoreResult<RevisionRecord> {
        self.tables
            .read()
            .await
            .revisions
            .get(pad_id)
            .and_then(|revs| revs.get(&rev))
            .cloned()
            .ok_or(StoreError::RevisionNotFound)
    }

    async fn get_revisions(&self, pad_id: &str, start: i64, end: i64) -> StoreResult<Vec<RevisionRecord>> {
        let tables = self.tables.read().await;
        let revs = tables.revisions.get(pad_id).ok_or(StoreError::RevisionNotFound)?;
        (start..=end)
            .map(|rev| revs.get(&rev).cloned().ok_or(StoreError::RevisionNotFound))
            .collect()
    }

    async fn remove_revision(&self, pad_id: &str, rev: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let removed = tables.revisions.get_mut(pad_id).and_then(|revs| revs.remove(&rev));
        removed.map(|_| ()).ok_or(StoreError::RevisionNotFound)
    }

    async fn remove_revisions_of_pad(&self, pad_id: &str) -> StoreResult<()> {
        self.tables.write().await.revisions.remove(pad_id);
        Ok(())
    }

    async fn get_pad_meta_data(&self, pad_id: &str, rev: i64) -> StoreResult<RevisionMeta> {
        let revision = self.get_revision(pad_id, rev).await?;
        Ok(RevisionMeta {
            rev: revision.rev,
            timestamp: revision.timestamp,
        })
    }

    async fn get_pad_ids_of_author(&self, author_id: &str) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let mut ids: Vec<String> = tables
            .revisions
            .iter()
            .filter(|(_, revs)| revs.values().any(|r| r.author_id.as_deref() == Some(author_id)))
            .map(|(pad_id, _)| pad_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn save_chat_message(&self, message: &ChatRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.pads.contains_key(&message.pad_id) {
            return Err(StoreError::PadNotFound);
        }
        tables
            .chats
            .entry(message.pad_id.clone())
            .or_default()
            .insert(message.seq, message.clone());
        Ok(())
    }

    async fn save_chat_head_of_pad(&self, pad_id: &str, head: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let pad = tables.pads.get_mut(pad_id).ok_or(StoreError::PadNotFound)?;
        pad.chat_head = head;
        Ok(())
    }

    async fn get_chats_of_pad(&self, pad_id: &str, start: i64, end: i64) -> StoreResult<Vec<ChatRecord>> {
        let tables = self.tables.read().await;
        let Some(chats) = tables.chats.get(pad_id) else {
            return Ok(Vec::new());
        };
        Ok(chats
            .range(start..=end)
            .map(|(_, chat)| {
                let mut chat = chat.clone();
                chat.user_name = chat
                    .author_id
                    .as_ref()
                    .and_then(|id| tables.authors.get(id))
                    .and_then(|author| author.name.clone());
                chat
            })
            .collect())
    }

    async fn get_author_ids_of_pad_chats(&self, pad_id: &str) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let ids: HashSet<String> = tables
            .chats
            .get(pad_id)
            .map(|chats| chats.values().filter_map(|c| c.author_id.clone()).collect())
            .unwrap_or_default();
        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.sort();
        Ok(ids)
    }

    async fn remove_chat(&self, pad_id: &str) -> StoreResult<()> {
        self.tables.write().await.chats.remove(pad_id);
        Ok(())
    }

    async fn set_read_only_id(&self, pad_id: &str, read_only_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.pad2readonly.contains_key(pad_id) {
            return Ok(());
        }
        tables.pad2readonly.insert(pad_id.to_string(), read_only_id.to_string());
        tables.readonly2pad.insert(read_only_id.to_string(), pad_id.to_string());
        Ok(())
    }

    async fn get_readonly_pad(&self, pad_id: &str) -> StoreResult<String> {
        self.tables
            .read()
            .await
            .pad2readonly
            .get(pad_id)
            .cloned()
            .ok_or(StoreError::ReadOnlyIdNotFound)
    }

    async fn get_pad_by_read_only_id(&self, read_only_id: &str) -> StoreResult<String> {
        self.tables
            .read()
            .await
            .readonly2pad
            .get(read_only_id)
            .cloned()
            .ok_or(StoreError::ReadOnlyIdNotFound)
    }

    async fn save_author(&self, author: &AuthorRecord) -> StoreResult<()> {
        self.tables.write().await.authors.insert(author.id.clone(), author.clone());
        Ok(())
    }

    async fn get_author(&self, author_id: &str) -> StoreResult<AuthorRecord> {
        self.tables
            .read()
            .await
            .authors
            .get(author_id)
            .cloned()
            .ok_or(StoreError::AuthorNotFound)
    }

    async fn get_authors(&self, author_ids: &[String]) -> StoreResult<Vec<AuthorRecord>> {
        let tables = self.tables.read().await;
        Ok(author_ids.iter().filter_map(|id| tables.authors.get(id).cloned()).collect())
    }

    async fn get_author_by_token(&self, token: &str) -> StoreResult<String> {
        self.tables
            .read()
            .await
            .token2author
            .get(token)
            .cloned()
            .ok_or(StoreError::AuthorNotFound)
    }

    async fn set_author_by_token(&self, token: &str, author_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.token2author.insert(token.to_string(), author_id.to_string());
        if let Some(author) = tables.authors.get_mut(author_id) {
            author.token = Some(token.to_string());
        }
        Ok(())
    }

    async fn save_author_name(&self, author_id: &str, name: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let author = tables.authors.get_mut(author_id).ok_or(StoreError::AuthorNotFound)?;
        author.name = Some(name.to_string());
        Ok(())
    }

    async fn save_author_color(&self, author_id: &str, color: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let author = tables.authors.get_mut(author_id).ok_or(StoreError::AuthorNotFound)?;
        author.color_id = color.to_string();
        Ok(())
    }

    async fn save_group(&self, group: &GroupRecord) -> StoreResult<()> {
        self.tables.write().await.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn remove_group(&self, group_id: &str) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .groups
            .remove(group_id)
            .map(|_| ())
            .ok_or(StoreError::GroupNotFound)
    }

    async fn get_group(&self, group_id: &str) -> StoreResult<GroupRecord> {
        self.tables
            .read()
            .await
            .groups
            .get(group_id)
            .cloned()
            .ok_or(StoreError::GroupNotFound)
    }

    async fn set_session_by_id(&self, session: &SessionRecord) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session_by_id(&self, session_id: &str) -> StoreResult<SessionRecord> {
        self.tables
            .read()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .ok_or(StoreError::SessionNotFound)
    }

    async fn remove_session_by_id(&self, session_id: &str) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .sessions
            .remove(session_id)
            .map(|_| ())
            .ok_or(StoreError::SessionNotFound)
    }

    async fn get_cookie_session(&self, key: &str) -> StoreResult<Option<String>> {
        let now = chrono::Utc::now().timestamp_millis();
        Ok(self
            .tables
            .read()
            .await
            .cookie_sessions
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set_cookie_session(&self, key: &str, value: &str, expires_at: i64) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .cookie_sessions
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete_cookie_session(&self, key: &str) -> StoreResult<()> {
        self.tables.write().await.cookie_sessions.remove(key);
        Ok(())
    }

    async fn cleanup_expired_cookie_sessions(&self, now: i64) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.cookie_sessions.len();
        tables.cookie_sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - tables.cookie_sessions.len()) as u64)
    }

    async fn reset_cookie_sessions(&self) -> StoreResult<()> {
        self.tables.write().await.cookie_sessions.clear();
        Ok(())
    }
}
