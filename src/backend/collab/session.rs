//! Per-connection state, keyed by session id.

use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub ip: String,
    /// Pad the session is bound to, always the real pad id
    pub pad_id: Option<String>,
    /// Alias the client joined through, for read-only sessions
    pub read_only_pad_id: Option<String>,
    pub read_only: bool,
    pub author: Option<String>,
    /// Last revision the client is known to have
    pub revision: i64,
    /// Timestamp of that revision
    pub time: i64,
}

impl Session {
    pub fn is_bound_to(&self, pad_id: &str) -> bool {
        self.pad_id.as_deref() == Some(pad_id)
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn init(&self, session_id: &str, ip: &str) {
        self.sessions.lock().await.insert(
            session_id.to_string(),
            Session {
                session_id: session_id.to_string(),
                ip: ip.to_string(),
                revision: -1,
                ..Session::default()
            },
        );
    }

    pub async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Applies `f` to the session if it still exists.
    pub async fn update<F>(&self, session_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        match self.sessions.lock().await.get_mut(session_id) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().await.remove(session_id)
    }

    /// Unbinds the session from its pad but keeps the connection entry.
    pub async fn reset(&self, session_id: &str) {
        self.update(session_id, |session| {
            session.pad_id = None;
            session.read_only_pad_id = None;
            session.read_only = false;
            session.author = None;
            session.revision = -1;
            session.time = 0;
        })
        .await;
    }

    /// Sessions bound to `pad_id`.
    pub async fn room(&self, pad_id: &str) -> Vec<Session> {
        let mut room: Vec<Session> = self
            .sessions
            .lock()
            .await
            .values()
            .filter(|s| s.is_bound_to(pad_id))
            .cloned()
            .collect();
        room.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        room
    }

    pub async fn count_in(&self, pad_id: &str) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|s| s.is_bound_to(pad_id))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Distinct pad ids with at least one bound session.
    pub async fn active_pads(&self) -> usize {
        let sessions = self.sessions.lock().await;
        let mut pads: Vec<&str> = sessions.values().filter_map(|s| s.pad_id.as_deref()).collect();
        pads.sort_unstable();
        pads.dedup();
        pads.len()
    }
}
