/**
 * Pad Model
 *
 * One collaborative document held in memory: its attributed text, its
 * attribute pool, the full revision log and the chat and saved-revision
 * counters. Every method here is synchronous and touches no storage; the
 * `PadManager` persists what these methods produce.
 *
 * # Invariants
 *
 * - `head >= -1` and `revisions.len() == head + 1`
 * - `atext` is the result of applying revisions `0..=head` to `"\n"`
 * - revisions whose number is a multiple of the keyframe interval carry a
 *   snapshot of the text and pool after the change
 */
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeSet;

use crate::backend::pad::{clean_text, PadError, PadResult};
use crate::backend::storage::{PadRecord, RevisionRecord};
use crate::shared::apool::{Attribute, AttributePool};
use crate::shared::atext::{apply_to_atext, ops_from_atext, AText};
use crate::shared::changeset::attributes::attribs_from_pairs;
use crate::shared::changeset::text::{char_len, CharCursor};
use crate::shared::changeset::{check_rep, is_identity, make_splice, Builder};
use crate::shared::error::ChangesetError;
use crate::shared::message::SavedRevision;

/// State restored when persisting a new revision fails
#[derive(Debug, Clone)]
pub struct PadSnapshot {
    head: i64,
    atext: AText,
    pool: AttributePool,
    updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct Pad {
    pub id: String,
    pub atext: AText,
    pub pool: AttributePool,
    pub head: i64,
    pub chat_head: i64,
    pub public_status: bool,
    pub read_only_id: Option<String>,
    pub saved_revisions: Vec<SavedRevision>,
    pub created_at: i64,
    pub updated_at: i64,
    revisions: Vec<RevisionRecord>,
    keyframe_interval: i64,
    removed: bool,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Pad {
    /// Empty pad with no revisions. `create` is the usual entry point.
    pub fn empty(id: impl Into<String>, keyframe_interval: i64) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            atext: AText::default(),
            pool: AttributePool::new(),
            head: -1,
            chat_head: -1,
            public_status: false,
            read_only_id: None,
            saved_revisions: Vec::new(),
            created_at: now,
            updated_at: now,
            revisions: Vec::new(),
            keyframe_interval: keyframe_interval.max(1),
            removed: false,
        }
    }

    /// New pad whose revision 0 inserts `text` after cleaning it.
    pub fn create(id: impl Into<String>, text: &str, author: Option<&str>, keyframe_interval: i64) -> PadResult<Self> {
        let mut pad = Self::empty(id, keyframe_interval);
        let text = clean_text(text);
        let attribs = pad.author_attribs(author);
        let cs = make_splice("\n", 0, 0, &text, &attribs);
        pad.append_revision(&cs, author)?;
        Ok(pad)
    }

    /// Rebuilds a pad from its stored header and full revision log.
    pub fn from_record(record: PadRecord, revisions: Vec<RevisionRecord>, keyframe_interval: i64) -> Self {
        Self {
            id: record.id,
            atext: record.atext,
            pool: AttributePool::from_jsonable(record.pool),
            head: record.head,
            chat_head: record.chat_head,
            public_status: record.public_status,
            read_only_id: record.read_only_id,
            saved_revisions: record.saved_revisions,
            created_at: record.created_at,
            updated_at: record.updated_at,
            revisions,
            keyframe_interval: keyframe_interval.max(1),
            removed: false,
        }
    }

    pub fn to_record(&self) -> PadRecord {
        PadRecord {
            id: self.id.clone(),
            head: self.head,
            chat_head: self.chat_head,
            public_status: self.public_status,
            read_only_id: self.read_only_id.clone(),
            atext: self.atext.clone(),
            pool: self.pool.to_jsonable(),
            saved_revisions: self.saved_revisions.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn text(&self) -> &str {
        &self.atext.text
    }

    pub fn revisions(&self) -> &[RevisionRecord] {
        &self.revisions
    }

    /// `*N` string carrying the author attribute, or empty.
    pub fn author_attribs(&mut self, author: Option<&str>) -> String {
        match author {
            Some(author) if !author.is_empty() => {
                attribs_from_pairs(&[Attribute::new("author", author)], true, &mut self.pool)
            }
            _ => String::new(),
        }
    }

    /// Set once the pad is deleted. Handles still held elsewhere must not
    /// write through it.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    pub fn snapshot(&self) -> PadSnapshot {
        PadSnapshot {
            head: self.head,
            atext: self.atext.clone(),
            pool: self.pool.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Drops every revision after the snapshot's head.
    pub fn restore(&mut self, snapshot: PadSnapshot) {
        self.revisions.truncate((snapshot.head + 1) as usize);
        self.head = snapshot.head;
        self.atext = snapshot.atext;
        self.pool = snapshot.pool;
        self.updated_at = snapshot.updated_at;
    }

    /// Applies `cs` as the next revision and returns its number. An
    /// identity changeset on a non-empty log is a no-op returning `head`.
    pub fn append_revision(&mut self, cs: &str, author: Option<&str>) -> PadResult<i64> {
        let unpacked = check_rep(cs)?;
        let text_len = char_len(&self.atext.text);
        if unpacked.old_len != text_len {
            return Err(PadError::InvalidChangeset(ChangesetError::LengthMismatch {
                expected: text_len,
                actual: unpacked.old_len,
            }));
        }
        if self.head >= 0 && is_identity(cs) {
            return Ok(self.head);
        }

        let new_atext = apply_to_atext(cs, &self.atext, &mut self.pool)?;
        let rev = self.head + 1;
        let timestamp = now_millis();
        let keyframe = rev % self.keyframe_interval == 0;
        self.revisions.push(RevisionRecord {
            pad_id: self.id.clone(),
            rev,
            changeset: cs.to_string(),
            atext: keyframe.then(|| new_atext.clone()),
            pool: keyframe.then(|| self.pool.to_jsonable()),
            author_id: author.map(str::to_string),
            timestamp,
        });
        self.atext = new_atext;
        self.head = rev;
        self.updated_at = timestamp;
        Ok(rev)
    }

    /// Changeset replacing the whole text with `new_text`.
    pub fn set_text_changeset(&mut self, new_text: &str, author: Option<&str>) -> String {
        let mut new_text = clean_text(new_text);
        if new_text.ends_with('\n') {
            new_text.pop();
        }
        let old = self.atext.text.clone();
        let attribs = self.author_attribs(author);
        make_splice(&old, 0, char_len(&old).saturating_sub(1), &new_text, &attribs)
    }

    /// Changeset inserting `text` before the final newline.
    pub fn append_text_changeset(&mut self, text: &str, author: Option<&str>) -> String {
        let text = clean_text(text);
        let old = self.atext.text.clone();
        let attribs = self.author_attribs(author);
        make_splice(&old, char_len(&old).saturating_sub(1), 0, &text, &attribs)
    }

    /// Changeset turning the head text into the text of revision `rev`,
    /// attribution included.
    pub fn restore_revision_changeset(&self, rev: i64) -> PadResult<String> {
        let target = self.get_internal_revision_atext(rev)?;
        let old_len = char_len(&self.atext.text);
        let mut builder = Builder::new(old_len);

        let mut cursor = CharCursor::new(&target.text);
        for op in ops_from_atext(&target)? {
            let piece = cursor.take(op.chars)?;
            builder.insert(piece, &op.attribs);
        }
        let old_lines = self.atext.text.matches('\n').count();
        builder.remove(old_len.saturating_sub(1), old_lines.saturating_sub(1));
        Ok(builder.to_string())
    }

    pub fn get_revision(&self, rev: i64) -> PadResult<&RevisionRecord> {
        if rev < 0 {
            return Err(PadError::not_found("pad revision not found"));
        }
        self.revisions
            .get(rev as usize)
            .ok_or_else(|| PadError::not_found("pad revision not found"))
    }

    pub fn get_rev_changeset(&self, rev: i64) -> PadResult<&str> {
        Ok(&self.get_revision(rev)?.changeset)
    }

    pub fn get_rev_author(&self, rev: i64) -> PadResult<Option<&str>> {
        Ok(self.get_revision(rev)?.author_id.as_deref())
    }

    pub fn get_rev_date(&self, rev: i64) -> PadResult<i64> {
        Ok(self.get_revision(rev)?.timestamp)
    }

    /// Timestamp of the head revision
    pub fn get_last_edit(&self) -> PadResult<i64> {
        self.get_rev_date(self.head)
    }

    /// Attributed text as of revision `rev`, replayed from the closest
    /// keyframe at or before it.
    pub fn get_internal_revision_atext(&self, rev: i64) -> PadResult<AText> {
        if rev < 0 || rev > self.head {
            return Err(PadError::not_found("pad revision not found"));
        }
        if rev == self.head {
            return Ok(self.atext.clone());
        }
        let keyframe = rev - rev % self.keyframe_interval;
        let (mut atext, from) = match self.get_revision(keyframe)?.atext.clone() {
            Some(atext) => (atext, keyframe + 1),
            None => (AText::default(), 0),
        };
        let mut pool = self.pool.clone();
        for r in from..=rev {
            atext = apply_to_atext(&self.get_revision(r)?.changeset, &atext, &mut pool)?;
        }
        Ok(atext)
    }

    /// Distinct author ids present as `author` attributes in the pool.
    pub fn get_all_authors(&self) -> Vec<String> {
        let mut authors = BTreeSet::new();
        self.pool.each_attrib(|_, attrib| {
            if attrib.key == "author" && !attrib.value.is_empty() {
                authors.insert(attrib.value.clone());
            }
        });
        authors.into_iter().collect()
    }

    /// Reserves the next chat sequence number.
    pub fn next_chat_seq(&mut self) -> i64 {
        self.chat_head += 1;
        self.chat_head
    }

    pub fn add_saved_revision(&mut self, rev: i64, author: &str, label: Option<&str>) -> SavedRevision {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();
        let saved = SavedRevision {
            rev_num: rev,
            saved_by: author.to_string(),
            label: label.map(str::to_string).unwrap_or_else(|| format!("Revision {}", rev)),
            id,
            timestamp: now_millis(),
        };
        self.saved_revisions.push(saved.clone());
        saved
    }

    /// Copy of this pad under `dest_id`, history included.
    pub fn copy_to(&self, dest_id: &str) -> Pad {
        let mut copy = self.clone();
        copy.id = dest_id.to_string();
        copy.removed = false;
        copy.saved_revisions.clear();
        copy.read_only_id = None;
        for revision in &mut copy.revisions {
            revision.pad_id = dest_id.to_string();
        }
        copy
    }

    /// New pad under `dest_id` whose single revision reproduces this pad's
    /// head text, attribution included, over a copy of this pool.
    pub fn copy_without_history(&self, dest_id: &str, author: Option<&str>) -> PadResult<Pad> {
        let mut copy = Pad::empty(dest_id, self.keyframe_interval);
        copy.pool = self.pool.clone();

        let mut builder = Builder::new(1);
        let mut cursor = CharCursor::new(&self.atext.text);
        for op in ops_from_atext(&self.atext)? {
            let piece = cursor.take(op.chars)?;
            builder.insert(piece, &op.attribs);
        }
        let cs = builder.to_string();
        copy.append_revision(&cs, author)?;
        Ok(copy)
    }

    /// Verifies the structural invariants.
    pub fn check(&self) -> PadResult<()> {
        if self.head < -1 {
            return Err(ChangesetError::invalid(format!("head {} is below -1", self.head)).into());
        }
        if self.revisions.len() as i64 != self.head + 1 {
            return Err(ChangesetError::invalid(format!(
                "revision log has {} entries for head {}",
                self.revisions.len(),
                self.head
            ))
            .into());
        }
        self.pool.check()?;
        self.atext.check(&self.pool)?;
        Ok(())
    }
}
