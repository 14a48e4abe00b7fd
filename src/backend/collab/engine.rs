/**
 * Collaboration Engine
 *
 * Dispatches decoded client frames. Work that touches a pad is queued on
 * that pad's mailbox so it runs in submission order; the engine itself is
 * a cheap handle that can be cloned into those jobs.
 *
 * # Commit pipeline
 *
 * 1. read-only sessions and rate-limited IPs are turned away
 * 2. the changeset is validated and its author attributes checked
 * 3. under the pad's write lock the client pool is merged into the pad
 *    pool and the changeset is rebased over every revision after `baseRev`
 * 4. the lock is released and the revision appended and persisted
 * 5. the sender gets ACCEPT_COMMIT, then every session behind the head
 *    gets NEW_CHANGES for each revision it is missing
 */
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::backend::author::{color_for, generate_token, is_valid_color, is_valid_token, AuthorManager, PALETTE};
use crate::backend::collab::mailbox::Mailboxes;
use crate::backend::collab::session::{Session, SessionStore};
use crate::backend::collab::timeslider::{changeset_info, CHUNKS_PER_REQUEST};
use crate::backend::collab::{CollabError, CollabResult};
use crate::backend::pad::manager::PadHandle;
use crate::backend::pad::readonly::is_read_only_id;
use crate::backend::pad::{is_valid_pad_id, PadManager, ReadOnlyManager};
use crate::backend::ratelimit::RateLimiter;
use crate::backend::realtime::hub::{Hub, Outbound};
use crate::backend::storage::{AuthorRecord, ChatRecord, SharedStore};
use crate::shared::apool::{AttributePool, PoolJson};
use crate::shared::changeset::attributes::rewrite_attrib_markers;
use crate::shared::changeset::text::char_len;
use crate::shared::changeset::{check_rep, follow, identity, move_ops_to_new_pool, new_len, old_len, prepare_for_wire};
use crate::shared::config::AppConfig;
use crate::shared::error::ChangesetError;
use crate::shared::message::{
    decode_client_frame, ChangesetRequest, ChangesetResponse, ChatMessageIn, ChatMessageOut, ClientMessage,
    ClientReady, ClientReconnect, ClientVars, CollabClientVars, CollabRoomMessage, CollabRoomOut, ColorId,
    DisconnectReason, HistoricalAuthor, InitialAttributedText, InitialChangeset, NewChanges, ServerFrame,
    ServerMessage, UserChanges, UserInfo, UserLeaveInfo, UserNewInfo,
};

const SESSION_REFRESH_INTERVAL_MS: u64 = 86_400_000;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn chat_out(record: ChatRecord) -> ChatMessageOut {
    ChatMessageOut {
        text: record.text,
        time: record.time,
        user_id: record.author_id,
        user_name: record.user_name,
    }
}

fn user_new_info(author: &AuthorRecord) -> ServerFrame {
    ServerFrame::collab(CollabRoomOut::UserNewInfo {
        user_info: UserNewInfo {
            user_id: author.id.clone(),
            name: author.name.clone(),
            color_id: author.color_id.clone(),
        },
    })
}

/// Palette index or `#rgb`/`#rrggbb` string, as a stored color.
fn resolve_color(color: &ColorId) -> Option<String> {
    match color {
        ColorId::Index(index) => PALETTE.get(*index).map(|c| c.to_string()),
        ColorId::Hex(hex) => is_valid_color(hex).then(|| hex.clone()),
    }
}

/// Counters served on `/stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_pads: usize,
    pub total_users: usize,
    pub active_pads: usize,
}

#[derive(Clone)]
pub struct CollabEngine {
    config: Arc<AppConfig>,
    pads: Arc<PadManager>,
    authors: Arc<AuthorManager>,
    readonly: Arc<ReadOnlyManager>,
    limiter: Arc<RateLimiter>,
    hub: Arc<Hub>,
    sessions: Arc<SessionStore>,
    mailboxes: Arc<Mailboxes>,
}

impl CollabEngine {
    pub fn new(config: AppConfig, store: SharedStore) -> Self {
        let pads = Arc::new(PadManager::new(
            store.clone(),
            config.default_pad_text.clone(),
            config.keyframe_interval,
        ));
        Self {
            authors: Arc::new(AuthorManager::new(store)),
            readonly: Arc::new(ReadOnlyManager::new(pads.clone())),
            limiter: Arc::new(RateLimiter::new(&config.commit_rate_limiting)),
            hub: Arc::new(Hub::new(config.outbound_buffer)),
            sessions: Arc::new(SessionStore::new()),
            mailboxes: Arc::new(Mailboxes::new()),
            pads,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pads(&self) -> &Arc<PadManager> {
        &self.pads
    }

    pub fn authors(&self) -> &Arc<AuthorManager> {
        &self.authors
    }

    pub fn readonly(&self) -> &Arc<ReadOnlyManager> {
        &self.readonly
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// IP as it may appear in logs and CLIENT_VARS.
    fn client_ip(&self, ip: &str) -> String {
        if self.config.disable_ip_logging {
            "ANONYMOUS".to_string()
        } else {
            ip.to_string()
        }
    }

    // ========== Transport ==========

    /// Registers a new connection and returns its outbound queue.
    pub async fn connect(&self, session_id: &str, ip: &str) -> mpsc::Receiver<Outbound> {
        self.sessions.init(session_id, ip).await;
        info!(session_id = %session_id, ip = %self.client_ip(ip), "[Collab] Client connected");
        self.hub.register(session_id).await
    }

    /// Forgets the connection and tells the rest of its pad it left.
    pub async fn disconnect(&self, session_id: &str) {
        self.hub.unregister(session_id).await;
        if let Some(session) = self.sessions.remove(session_id).await {
            self.announce_leave(&session).await;
            info!(session_id = %session_id, "[Collab] Client disconnected");
        }
    }

    async fn send(&self, session_id: &str, frame: ServerFrame) -> bool {
        match frame.to_json() {
            Ok(json) => self.hub.send_to(session_id, json).await,
            Err(err) => {
                warn!(session_id = %session_id, "[Collab] Failed to encode frame: {}", err);
                false
            }
        }
    }

    async fn send_collab(&self, session_id: &str, out: CollabRoomOut) -> bool {
        self.send(session_id, ServerFrame::collab(out)).await
    }

    async fn broadcast(&self, session_ids: &[String], frame: ServerFrame) {
        match frame.to_json() {
            Ok(json) => {
                self.hub.broadcast_to(session_ids, &json).await;
            }
            Err(err) => warn!("[Collab] Failed to encode broadcast: {}", err),
        }
    }

    async fn room_ids(&self, pad_id: &str, except: Option<&str>) -> Vec<String> {
        self.sessions
            .room(pad_id)
            .await
            .into_iter()
            .map(|s| s.session_id)
            .filter(|id| Some(id.as_str()) != except)
            .collect()
    }

    /// Sends `{disconnect: reason}`, unbinds the session and closes it.
    async fn kick(&self, session_id: &str, reason: DisconnectReason) {
        let session = self.sessions.get(session_id).await;
        self.send(session_id, ServerFrame::disconnect(reason)).await;
        self.sessions.reset(session_id).await;
        self.hub.close(session_id).await;
        if let Some(session) = session {
            if !matches!(reason, DisconnectReason::Userdup | DisconnectReason::Deleted) {
                self.announce_leave(&session).await;
            }
        }
    }

    async fn announce_leave(&self, session: &Session) {
        let (Some(pad_id), Some(author_id)) = (session.pad_id.as_deref(), session.author.as_deref()) else {
            return;
        };
        let color_id = match self.authors.get_author(author_id).await {
            Ok(author) => author.color_id,
            Err(_) => color_for(author_id).to_string(),
        };
        let others = self.room_ids(pad_id, Some(&session.session_id)).await;
        let frame = ServerFrame::collab(CollabRoomOut::UserLeave {
            user_info: UserLeaveInfo {
                user_id: author_id.to_string(),
                color_id,
            },
        });
        self.broadcast(&others, frame).await;
    }

    // ========== Dispatch ==========

    /// Handles one inbound text frame. Returns false when the connection
    /// should be closed.
    pub async fn handle_frame(&self, session_id: &str, text: &str) -> bool {
        match decode_client_frame(text) {
            Ok(Some(message)) => self.handle_message(session_id, message).await,
            Ok(None) => {
                warn!(session_id = %session_id, "[Collab] Ignoring frame of unknown type");
                true
            }
            Err(err) => {
                warn!(session_id = %session_id, "[Collab] Malformed frame: {}", err);
                self.hub.close(session_id).await;
                false
            }
        }
    }

    pub async fn handle_message(&self, session_id: &str, message: ClientMessage) -> bool {
        match message {
            ClientMessage::ClientReady(ready) => {
                self.handle_client_ready(session_id, ready).await;
                true
            }
            ClientMessage::CollabRoom { data } => self.handle_collab_room(session_id, data).await,
            ClientMessage::ChangesetReq { data } => {
                if let Err(err) = self.handle_changeset_request(session_id, data).await {
                    warn!(session_id = %session_id, "[Collab] CHANGESET_REQ failed: {}", err);
                }
                true
            }
        }
    }

    async fn handle_collab_room(&self, session_id: &str, message: CollabRoomMessage) -> bool {
        let Some(session) = self.sessions.get(session_id).await else {
            return false;
        };
        let Some(pad_id) = session.pad_id.clone() else {
            warn!(session_id = %session_id, "[Collab] COLLABROOM message before CLIENT_READY");
            return true;
        };
        let writes = matches!(
            message,
            CollabRoomMessage::UserChanges(_)
                | CollabRoomMessage::ChatMessage { .. }
                | CollabRoomMessage::SaveRevision
                | CollabRoomMessage::PadDelete { .. }
        );
        if writes && session.read_only {
            warn!(session_id = %session_id, pad_id = %pad_id, "[Collab] Read-only session attempted a write");
            return true;
        }

        let result = match message {
            CollabRoomMessage::UserChanges(changes) => {
                if self.limiter.check(&session.ip).await.is_err() {
                    warn!(
                        session_id = %session_id,
                        ip = %self.client_ip(&session.ip),
                        "[RateLimit] Commit rate exceeded, disconnecting"
                    );
                    self.kick(session_id, DisconnectReason::RateLimited).await;
                    return false;
                }
                let engine = self.clone();
                let sid = session_id.to_string();
                self.mailboxes
                    .submit(&pad_id, async move { engine.run_user_changes(&sid, changes).await })
                    .await;
                Ok(())
            }
            CollabRoomMessage::ChatMessage { message } => {
                let engine = self.clone();
                let sid = session_id.to_string();
                self.mailboxes
                    .submit(&pad_id, async move {
                        if let Err(err) = engine.handle_chat_message(&sid, message).await {
                            warn!(session_id = %sid, "[Collab] CHAT_MESSAGE failed: {}", err);
                        }
                    })
                    .await;
                Ok(())
            }
            CollabRoomMessage::SaveRevision => {
                let engine = self.clone();
                let sid = session_id.to_string();
                self.mailboxes
                    .submit(&pad_id, async move {
                        if let Err(err) = engine.handle_save_revision(&sid).await {
                            warn!(session_id = %sid, "[Collab] SAVE_REVISION failed: {}", err);
                        }
                    })
                    .await;
                Ok(())
            }
            CollabRoomMessage::GetChatMessages { start, end } => {
                self.handle_get_chat_messages(&session, &pad_id, start, end).await
            }
            CollabRoomMessage::UserInfoUpdate { user_info } => {
                self.handle_user_info_update(&session, &pad_id, user_info).await
            }
            CollabRoomMessage::PadDelete { pad_id: requested } => {
                let engine = self.clone();
                let sid = session_id.to_string();
                self.mailboxes
                    .submit(&pad_id, async move {
                        if let Err(err) = engine.handle_pad_delete(&sid, &requested).await {
                            warn!(session_id = %sid, "[Collab] PAD_DELETE failed: {}", err);
                        }
                    })
                    .await;
                Ok(())
            }
        };
        if let Err(err) = result {
            warn!(session_id = %session_id, pad_id = %pad_id, "[Collab] Request failed: {}", err);
        }
        true
    }

    // ========== Handshake ==========

    async fn handle_client_ready(&self, session_id: &str, ready: ClientReady) {
        if self.sessions.get(session_id).await.is_none() {
            return;
        }
        let token = match ready.token.as_deref() {
            None => generate_token(),
            Some(token) if is_valid_token(token) => token.to_string(),
            Some(_) => {
                warn!(session_id = %session_id, "[Collab] Refusing malformed token");
                self.send(session_id, ServerFrame::deny()).await;
                return;
            }
        };

        let (pad_id, read_only_pad_id) = if is_read_only_id(&ready.pad_id) {
            match self.readonly.get_pad_id(&ready.pad_id).await {
                Ok(pad_id) => (pad_id, Some(ready.pad_id.clone())),
                Err(err) => {
                    warn!(session_id = %session_id, "[Collab] Unknown read-only id: {}", err);
                    self.send(session_id, ServerFrame::deny()).await;
                    return;
                }
            }
        } else if is_valid_pad_id(&ready.pad_id) {
            (ready.pad_id.clone(), None)
        } else {
            warn!(session_id = %session_id, "[Collab] Invalid pad id {}", ready.pad_id);
            self.send(session_id, ServerFrame::deny()).await;
            return;
        };

        let author = match self.apply_user_info(&token, &ready.user_info).await {
            Ok(author) => author,
            Err(err) => {
                warn!(session_id = %session_id, "[Collab] Could not resolve author: {}", err);
                self.send(session_id, ServerFrame::deny()).await;
                return;
            }
        };

        let engine = self.clone();
        let sid = session_id.to_string();
        let job_pad_id = pad_id.clone();
        self.mailboxes
            .submit(&pad_id, async move {
                let rejoin = match (ready.reconnect, ready.client_rev) {
                    (Some(true), Some(rev)) => Some(rev),
                    _ => None,
                };
                if let Err(err) = engine
                    .join_pad(&sid, &job_pad_id, read_only_pad_id, author, rejoin)
                    .await
                {
                    warn!(session_id = %sid, pad_id = %job_pad_id, "[Collab] CLIENT_READY failed: {}", err);
                }
            })
            .await;
    }

    /// Resolves the token's author and applies any requested name or color.
    async fn apply_user_info(&self, token: &str, info: &UserInfo) -> CollabResult<AuthorRecord> {
        let mut author = self.authors.get_author_for_token(token).await?;
        if let Some(name) = &info.name {
            if author.name.as_ref() != Some(name) {
                self.authors.set_author_name(&author.id, name).await?;
                author.name = Some(name.clone());
            }
        }
        if let Some(color) = info.color_id.as_ref().and_then(resolve_color) {
            if color != author.color_id {
                self.authors.set_author_color(&author.id, &color).await?;
                author.color_id = color;
            }
        }
        Ok(author)
    }

    async fn join_pad(
        &self,
        session_id: &str,
        pad_id: &str,
        read_only_pad_id: Option<String>,
        author: AuthorRecord,
        rejoin_from: Option<i64>,
    ) -> CollabResult<()> {
        let pad = self.pads.get_pad(pad_id, None, Some(&author.id)).await?;

        for other in self.sessions.room(pad_id).await {
            if other.session_id != session_id && other.author.as_deref() == Some(author.id.as_str()) {
                info!(session_id = %other.session_id, pad_id = %pad_id, "[Collab] Kicking duplicate session");
                self.kick(&other.session_id, DisconnectReason::Userdup).await;
            }
        }

        let (head, head_time) = {
            let guard = pad.read().await;
            (guard.head, guard.get_last_edit()?)
        };
        let read_only = read_only_pad_id.is_some();
        let bound = self
            .sessions
            .update(session_id, |s| {
                s.pad_id = Some(pad_id.to_string());
                s.read_only_pad_id = read_only_pad_id;
                s.read_only = read_only;
                s.author = Some(author.id.clone());
                s.revision = head;
                s.time = head_time;
            })
            .await;
        if !bound {
            return Ok(());
        }

        match rejoin_from {
            Some(client_rev) => self.send_reconnect(session_id, &pad, client_rev).await?,
            None => self.send_client_vars(session_id, pad_id, &pad, &author).await?,
        }

        let others = self.room_ids(pad_id, Some(session_id)).await;
        self.broadcast(&others, user_new_info(&author)).await;
        for other in self.sessions.room(pad_id).await {
            let Some(other_author) = other.author.as_deref() else {
                continue;
            };
            if other.session_id == session_id || other_author == author.id {
                continue;
            }
            if let Ok(record) = self.authors.get_author(other_author).await {
                self.send(session_id, user_new_info(&record)).await;
            }
        }
        info!(session_id = %session_id, pad_id = %pad_id, rev = head, "[Collab] Client joined pad");
        Ok(())
    }

    /// One CLIENT_RECONNECT per revision after `client_rev`, or a single
    /// `noChanges` frame when the client is current.
    async fn send_reconnect(&self, session_id: &str, pad: &PadHandle, client_rev: i64) -> CollabResult<()> {
        let frames = {
            let guard = pad.read().await;
            if client_rev >= guard.head {
                vec![ClientReconnect {
                    new_rev: guard.head,
                    no_changes: true,
                    ..ClientReconnect::default()
                }]
            } else {
                let mut frames = Vec::new();
                for rev in (client_rev + 1).max(0)..=guard.head {
                    let revision = guard.get_revision(rev)?;
                    let (changeset, pool) = prepare_for_wire(&revision.changeset, &guard.pool)?;
                    frames.push(ClientReconnect {
                        head_rev: Some(guard.head),
                        new_rev: rev,
                        changeset: Some(changeset),
                        apool: Some(pool.to_jsonable()),
                        author: revision.author_id.clone(),
                        current_time: Some(revision.timestamp),
                        no_changes: false,
                    });
                }
                frames
            }
        };
        for frame in frames {
            self.send_collab(session_id, CollabRoomOut::ClientReconnect(frame)).await;
        }
        Ok(())
    }

    async fn send_client_vars(
        &self,
        session_id: &str,
        pad_id: &str,
        pad: &PadHandle,
        author: &AuthorRecord,
    ) -> CollabResult<()> {
        let Some(session) = self.sessions.get(session_id).await else {
            return Ok(());
        };

        let (atext, wire_pool, initial_changesets, pad_authors, saved_revisions, chat_head, head, last_edit) = {
            let guard = pad.read().await;
            let mut wire_pool = AttributePool::new();
            let attribs = move_ops_to_new_pool(&guard.atext.attribs, &guard.pool, &mut wire_pool)?;

            let first = (guard.head + 1 - self.config.initial_changesets as i64).max(0);
            let mut initial = Vec::new();
            for rev in first..=guard.head {
                let revision = guard.get_revision(rev)?;
                initial.push(InitialChangeset {
                    rev,
                    changeset: move_ops_to_new_pool(&revision.changeset, &guard.pool, &mut wire_pool)?,
                    author: revision.author_id.clone(),
                    time: revision.timestamp,
                });
            }
            (
                InitialAttributedText {
                    text: guard.atext.text.clone(),
                    attribs,
                },
                wire_pool,
                initial,
                guard.get_all_authors(),
                guard.saved_revisions.clone(),
                guard.chat_head,
                guard.head,
                guard.get_last_edit()?,
            )
        };

        let mut author_ids: BTreeSet<String> = pad_authors.into_iter().collect();
        author_ids.extend(self.pads.get_all_chatters(pad_id).await?);
        let author_ids: Vec<String> = author_ids.into_iter().collect();
        let historical_author_data: BTreeMap<String, HistoricalAuthor> = self
            .authors
            .get_authors(&author_ids)
            .await?
            .into_iter()
            .map(|a| {
                (
                    a.id,
                    HistoricalAuthor {
                        name: a.name,
                        color_id: a.color_id,
                    },
                )
            })
            .collect();

        let (visible_pad_id, read_only_id) = match &session.read_only_pad_id {
            Some(alias) => (alias.clone(), alias.clone()),
            None => (pad_id.to_string(), self.readonly.get_read_only_id(pad_id).await?),
        };
        let client_ip = self.client_ip(&session.ip);

        let vars = ClientVars {
            collab_client_vars: CollabClientVars {
                initial_attributed_text: atext,
                client_ip: client_ip.clone(),
                pad_id: visible_pad_id.clone(),
                historical_author_data,
                apool: wire_pool.to_jsonable(),
                rev: head,
                time: last_edit,
            },
            color_palette: PALETTE.iter().map(|c| c.to_string()).collect(),
            client_ip,
            user_color: author.color_id.clone(),
            user_name: author.name.clone(),
            user_id: author.id.clone(),
            initial_title: format!("Pad: {}", visible_pad_id),
            pad_id: visible_pad_id,
            read_only_id,
            read_only: session.read_only,
            server_timestamp: now_millis(),
            initial_revision_list: Vec::new(),
            initial_changesets,
            saved_revisions,
            chat_head,
            num_connected_users: self.sessions.count_in(pad_id).await,
            pad_options: self.config.pad_options.clone(),
            session_refresh_interval: SESSION_REFRESH_INTERVAL_MS,
            automatic_reconnection_timeout: 0,
        };
        self.send(session_id, ServerMessage::ClientVars(Box::new(vars)).into()).await;
        Ok(())
    }

    // ========== Commits ==========

    async fn run_user_changes(&self, session_id: &str, changes: UserChanges) {
        match self.handle_user_changes(session_id, changes).await {
            Ok(()) => {}
            Err(err) if err.is_bad_changeset() => {
                warn!(session_id = %session_id, "[Collab] Rejected changeset: {}", err);
                self.kick(session_id, DisconnectReason::BadChangeset).await;
            }
            Err(err) => warn!(session_id = %session_id, "[Collab] Commit failed: {}", err),
        }
    }

    async fn handle_user_changes(&self, session_id: &str, changes: UserChanges) -> CollabResult<()> {
        let Some(session) = self.sessions.get(session_id).await else {
            return Ok(());
        };
        let (Some(pad_id), Some(author)) = (session.pad_id.clone(), session.author.clone()) else {
            return Ok(());
        };
        let pad = self.pads.get_pad(&pad_id, None, None).await?;

        check_rep(&changes.changeset)?;
        let client_pool = AttributePool::from_jsonable(changes.apool);
        rewrite_attrib_markers(&changes.changeset, |num| {
            let attrib = client_pool.require_attrib(num)?;
            if attrib.key == "author" && attrib.value != author {
                return Err(ChangesetError::invalid(format!(
                    "author attribute {} does not match the session author",
                    attrib.value
                )));
            }
            Ok(num)
        })?;

        let rebased = {
            let mut guard = pad.write().await;
            let head = guard.head;
            if changes.base_rev < 0 || changes.base_rev > head {
                return Err(CollabError::BadChangeset(format!(
                    "base revision {} outside 0..={}",
                    changes.base_rev, head
                )));
            }
            let mut cs = move_ops_to_new_pool(&changes.changeset, &client_pool, &mut guard.pool)?;
            for rev in changes.base_rev + 1..=head {
                let committed = guard.get_revision(rev)?;
                cs = if committed.changeset == cs && committed.author_id.as_deref() == Some(author.as_str()) {
                    identity(new_len(&cs)?)
                } else {
                    follow(&committed.changeset, &cs, false, &guard.pool)?
                };
            }
            let text_len = char_len(guard.text());
            let cs_len = old_len(&cs)?;
            if cs_len != text_len {
                return Err(CollabError::BadChangeset(format!(
                    "changeset applies to length {} but the pad has {}",
                    cs_len, text_len
                )));
            }
            cs
        };

        let new_rev = self.pads.append_revision(&pad, &rebased, Some(&author)).await?;
        let rev_time = pad.read().await.get_rev_date(new_rev)?;
        self.send_collab(session_id, CollabRoomOut::AcceptCommit { new_rev }).await;
        self.sessions
            .update(session_id, |s| {
                s.revision = new_rev;
                s.time = rev_time;
            })
            .await;
        info!(pad_id = %pad_id, rev = new_rev, "[Collab] Commit accepted");

        self.update_pad_clients(&pad_id, &pad).await
    }

    /// Sends every bound session the revisions it has not seen yet.
    async fn update_pad_clients(&self, pad_id: &str, pad: &PadHandle) -> CollabResult<()> {
        let room = self.sessions.room(pad_id).await;
        let mut outgoing = Vec::new();
        {
            let guard = pad.read().await;
            let head = guard.head;
            let mut wire_cache: HashMap<i64, (String, PoolJson)> = HashMap::new();
            for session in room {
                if session.revision >= head {
                    continue;
                }
                let mut time = session.time;
                let mut frames = Vec::new();
                for rev in (session.revision + 1).max(0)..=head {
                    let revision = guard.get_revision(rev)?;
                    let (changeset, apool) = match wire_cache.get(&rev) {
                        Some(cached) => cached.clone(),
                        None => {
                            let (cs, pool) = prepare_for_wire(&revision.changeset, &guard.pool)?;
                            let entry = (cs, pool.to_jsonable());
                            wire_cache.insert(rev, entry.clone());
                            entry
                        }
                    };
                    frames.push(ServerFrame::collab(CollabRoomOut::NewChanges(NewChanges {
                        new_rev: rev,
                        changeset,
                        apool,
                        author: revision.author_id.clone(),
                        current_time: revision.timestamp,
                        time_delta: revision.timestamp - time,
                    })));
                    time = revision.timestamp;
                }
                outgoing.push((session.session_id, head, time, frames));
            }
        }

        for (session_id, head, time, frames) in outgoing {
            for frame in frames {
                if !self.send(&session_id, frame).await {
                    break;
                }
            }
            self.sessions
                .update(&session_id, |s| {
                    s.revision = head;
                    s.time = time;
                })
                .await;
            debug!(session_id = %session_id, rev = head, "[Collab] Client caught up");
        }
        Ok(())
    }

    // ========== Chat, user info, saved revisions ==========

    async fn handle_chat_message(&self, session_id: &str, message: ChatMessageIn) -> CollabResult<()> {
        let Some(session) = self.sessions.get(session_id).await else {
            return Ok(());
        };
        let Some(pad_id) = session.pad_id.as_deref() else {
            return Ok(());
        };
        let pad = self.pads.get_pad(pad_id, None, None).await?;
        let time = message.time.unwrap_or_else(now_millis);
        let mut record = self
            .pads
            .append_chat_message(&pad, &message.text, session.author.as_deref(), time)
            .await?;
        if let Some(author_id) = session.author.as_deref() {
            record.user_name = self.authors.get_author(author_id).await.ok().and_then(|a| a.name);
        }

        let room = self.room_ids(pad_id, None).await;
        self.broadcast(&room, ServerFrame::collab(CollabRoomOut::ChatMessage(chat_out(record))))
            .await;
        Ok(())
    }

    async fn handle_get_chat_messages(&self, session: &Session, pad_id: &str, start: i64, end: i64) -> CollabResult<()> {
        if start < 0 || end < start || end - start > self.config.max_chat_request {
            return Err(CollabError::InvalidRequest(format!("chat range {}..={}", start, end)));
        }
        let pad = self.pads.get_pad(pad_id, None, None).await?;
        let chat_head = pad.read().await.chat_head;
        let end = end.min(chat_head);
        let messages = if start > end {
            Vec::new()
        } else {
            self.pads
                .get_chat_messages(&pad, start, end)
                .await?
                .into_iter()
                .map(chat_out)
                .collect()
        };
        self.send_collab(&session.session_id, CollabRoomOut::ChatMessages { messages })
            .await;
        Ok(())
    }

    async fn handle_user_info_update(&self, session: &Session, pad_id: &str, info: UserInfo) -> CollabResult<()> {
        let Some(author_id) = session.author.as_deref() else {
            return Ok(());
        };
        if let Some(color) = &info.color_id {
            let color = resolve_color(color)
                .ok_or_else(|| CollabError::InvalidRequest(format!("invalid color {:?}", color)))?;
            self.authors.set_author_color(author_id, &color).await?;
        }
        if let Some(name) = &info.name {
            self.authors.set_author_name(author_id, name).await?;
        }
        let author = self.authors.get_author(author_id).await?;
        let others = self.room_ids(pad_id, Some(&session.session_id)).await;
        self.broadcast(&others, user_new_info(&author)).await;
        Ok(())
    }

    async fn handle_save_revision(&self, session_id: &str) -> CollabResult<()> {
        let Some(session) = self.sessions.get(session_id).await else {
            return Ok(());
        };
        let (Some(pad_id), Some(author)) = (session.pad_id.as_deref(), session.author.as_deref()) else {
            return Ok(());
        };
        let pad = self.pads.get_pad(pad_id, None, None).await?;
        let head = pad.read().await.head;
        self.pads.add_saved_revision(&pad, head, author, None).await?;
        let saved_revisions = pad.read().await.saved_revisions.clone();

        let room = self.room_ids(pad_id, None).await;
        self.broadcast(&room, ServerFrame::collab(CollabRoomOut::NewSavedRev { saved_revisions }))
            .await;
        Ok(())
    }

    // ========== Pad deletion ==========

    /// Only the author of revision 0 may delete a pad. Runs on the pad's
    /// queue, so writes submitted before it are already persisted.
    async fn handle_pad_delete(&self, session_id: &str, requested: &str) -> CollabResult<()> {
        let Some(session) = self.sessions.get(session_id).await else {
            return Ok(());
        };
        let Some(pad_id) = session.pad_id.as_deref() else {
            return Ok(());
        };
        let pad = self.pads.get_pad(pad_id, None, None).await?;
        let creator = pad.read().await.get_rev_author(0)?.map(str::to_string);
        if requested == pad_id && creator.is_some() && creator == session.author {
            self.evict_pad(pad_id).await?;
            self.mailboxes.close(pad_id).await;
            return Ok(());
        }
        self.send_collab(
            session_id,
            CollabRoomOut::ShowError {
                message_id: "pad.delete.cannotdelete".to_string(),
            },
        )
        .await;
        Ok(())
    }

    /// Runs `job` on `pad_id`'s queue and waits for its result.
    async fn run_queued<T, F>(&self, pad_id: &str, job: F) -> CollabResult<T>
    where
        T: Send + 'static,
        F: Future<Output = CollabResult<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.mailboxes
            .submit(pad_id, async move {
                let _ = tx.send(job.await);
            })
            .await;
        rx.await.map_err(|_| CollabError::QueueClosed(pad_id.to_string()))?
    }

    /// Kicks every session on the pad, then removes it with its history.
    /// Callers must be on the pad's queue.
    async fn evict_pad(&self, pad_id: &str) -> CollabResult<()> {
        for session in self.sessions.room(pad_id).await {
            self.kick(&session.session_id, DisconnectReason::Deleted).await;
        }
        self.pads.remove_pad(pad_id).await?;
        info!(pad_id = %pad_id, "[Collab] Pad deleted");
        Ok(())
    }

    /// Kicks every session on the pad and removes it with its history,
    /// after the pad's queued writes.
    pub async fn delete_pad(&self, pad_id: &str) -> CollabResult<()> {
        let engine = self.clone();
        let id = pad_id.to_string();
        self.run_queued(pad_id, async move { engine.evict_pad(&id).await })
            .await?;
        self.mailboxes.close(pad_id).await;
        Ok(())
    }

    /// Copies `src` to `dest`, with its history or as a single revision.
    /// With `force` an existing destination is deleted first and its
    /// sessions are kicked; without it an existing destination is a
    /// Conflict.
    pub async fn copy_pad(&self, src: &str, dest: &str, force: bool, with_history: bool) -> CollabResult<()> {
        let engine = self.clone();
        let (src_id, dest_id) = (src.to_string(), dest.to_string());
        self.run_queued(dest, async move {
            if force && engine.pads.does_pad_exist(&dest_id).await? {
                engine.evict_pad(&dest_id).await?;
            }
            if with_history {
                engine.pads.copy(&src_id, &dest_id, false).await?;
            } else {
                engine.pads.copy_without_history(&src_id, &dest_id, false, None).await?;
            }
            Ok(())
        })
        .await
    }

    // ========== Timeslider ==========

    async fn handle_changeset_request(&self, session_id: &str, request: ChangesetRequest) -> CollabResult<()> {
        let Some(session) = self.sessions.get(session_id).await else {
            return Ok(());
        };
        let Some(pad_id) = session.pad_id.as_deref() else {
            return Err(CollabError::InvalidRequest("CHANGESET_REQ before CLIENT_READY".to_string()));
        };
        if request.granularity <= 0 || request.start < 0 {
            return Err(CollabError::InvalidRequest(format!(
                "start {} granularity {}",
                request.start, request.granularity
            )));
        }
        let pad = self.pads.get_pad(pad_id, None, None).await?;
        let end = request
            .start
            .saturating_add(CHUNKS_PER_REQUEST.saturating_mul(request.granularity));
        let data = {
            let guard = pad.read().await;
            changeset_info(&guard, request.start, end, request.granularity)?
        };
        let response = ChangesetResponse {
            request_id: request.request_id,
            data,
        };
        self.send(session_id, ServerMessage::ChangesetReq(response).into()).await;
        Ok(())
    }

    // ========== Maintenance ==========

    pub async fn stats(&self) -> CollabResult<EngineStats> {
        Ok(EngineStats {
            total_pads: self.pads.list_all_pads().await?.len(),
            total_users: self.hub.client_count().await,
            active_pads: self.sessions.active_pads().await,
        })
    }

    /// Drops idle rate-limiter entries and expired cookie sessions.
    pub async fn cleanup(&self) {
        let purged = self.limiter.purge_idle().await;
        match self
            .pads
            .store()
            .cleanup_expired_cookie_sessions(now_millis())
            .await
        {
            Ok(removed) => debug!(purged, removed, "[Collab] Cleanup finished"),
            Err(err) => warn!("[Storage] Cookie session cleanup failed: {}", err),
        }
    }

    pub async fn shutdown(&self) {
        self.hub.shutdown().await;
        info!("[Collab] Hub closed");
    }
}
