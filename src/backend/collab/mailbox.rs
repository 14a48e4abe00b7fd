//! Per-pad task queues. Jobs submitted for one pad run one at a time, in
//! submission order, on a worker task owned by that pad. Different pads
//! run in parallel.

use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

const MAILBOX_CAPACITY: usize = 64;

type Job = BoxFuture<'static, ()>;

#[derive(Default)]
pub struct Mailboxes {
    workers: Mutex<HashMap<String, mpsc::Sender<Job>>>,
}

fn spawn_worker(pad_id: &str) -> mpsc::Sender<Job> {
    let (tx, mut rx) = mpsc::channel::<Job>(MAILBOX_CAPACITY);
    let pad_id = pad_id.to_string();
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            job.await;
        }
        debug!(pad_id = %pad_id, "[Collab] Pad worker stopped");
    });
    tx
}

impl Mailboxes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `job` behind every job already submitted for `pad_id`.
    pub async fn submit<F>(&self, pad_id: &str, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tx = {
            let mut workers = self.workers.lock().await;
            workers
                .entry(pad_id.to_string())
                .or_insert_with(|| spawn_worker(pad_id))
                .clone()
        };

        if let Err(mpsc::error::SendError(job)) = tx.send(Box::pin(job)).await {
            warn!(pad_id = %pad_id, "[Collab] Pad worker gone, restarting");
            let tx = spawn_worker(pad_id);
            self.workers.lock().await.insert(pad_id.to_string(), tx.clone());
            let _ = tx.send(job).await;
        }
    }

    /// Stops the pad's worker once its queued jobs finish.
    pub async fn close(&self, pad_id: &str) {
        self.workers.lock().await.remove(pad_id);
    }

    pub async fn len(&self) -> usize {
        self.workers.lock().await.len()
    }
}
