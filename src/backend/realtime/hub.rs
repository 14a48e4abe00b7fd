/**
 * Client Hub
 *
 * Registry of live WebSocket clients keyed by session id. Each client owns
 * a bounded outbound channel drained by its writer task. A send that finds
 * the channel full evicts the client, which closes its socket.
 */
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Frames queued for a client's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

#[derive(Debug)]
struct ClientHandle {
    tx: mpsc::Sender<Outbound>,
}

pub struct Hub {
    clients: RwLock<HashMap<String, ClientHandle>>,
    buffer: usize,
}

impl Hub {
    pub fn new(buffer: usize) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Adds a client and returns the receiving end of its outbound queue.
    pub async fn register(&self, session_id: &str) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.clients
            .write()
            .await
            .insert(session_id.to_string(), ClientHandle { tx });
        debug!(session_id = %session_id, "[Hub] Client registered");
        rx
    }

    /// Removes the client. Dropping its sender ends the writer task.
    pub async fn unregister(&self, session_id: &str) -> bool {
        self.clients.write().await.remove(session_id).is_some()
    }

    /// Queues `text` for one client. Returns false when the client is gone
    /// or was evicted for a full queue.
    pub async fn send_to(&self, session_id: &str, text: String) -> bool {
        let result = match self.clients.read().await.get(session_id) {
            Some(client) => client.tx.try_send(Outbound::Text(text)),
            None => return false,
        };
        match result {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(session_id = %session_id, "[Hub] Outbound queue full, evicting client");
                self.unregister(session_id).await;
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.unregister(session_id).await;
                false
            }
        }
    }

    /// Queues the same frame for each listed client. Returns how many
    /// accepted it.
    pub async fn broadcast_to(&self, session_ids: &[String], text: &str) -> usize {
        let mut delivered = 0;
        for session_id in session_ids {
            if self.send_to(session_id, text.to_string()).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Asks the writer to close the socket and forgets the client.
    pub async fn close(&self, session_id: &str) {
        if let Some(client) = self.clients.write().await.remove(session_id) {
            let _ = client.tx.try_send(Outbound::Close);
        }
    }

    /// Closes every client.
    pub async fn shutdown(&self) {
        let mut clients = self.clients.write().await;
        for (_, client) in clients.drain() {
            let _ = client.tx.try_send(Outbound::Close);
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_connected(&self, session_id: &str) -> bool {
        self.clients.read().await.contains_key(session_id)
    }
}
