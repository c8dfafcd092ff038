//! Searches accepted while offline, replayed on reconnect.
//!
//! The persisted queue has exactly one owner: the task spawned by
//! [`QueueHandle::spawn`]. The page and the cache worker each hold a
//! [`QueueHandle`] and talk to the owner over a channel, so enqueue and
//! drain never interleave on the stored list.
//!
//! Draining is at-most-once: the whole queue is taken (and the stored list
//! cleared) before any entry is processed, and an entry whose handler fails
//! is dropped, not put back.

use std::{future::Future, sync::Arc};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::{QueueError, StoreError},
    store::{JsonSlot, KeyValueStore, StoreKey},
};

const COMMAND_BUFFER: usize = 32;

/// The persisted FIFO list. Only the owner task touches it.
#[derive(Debug)]
pub struct OfflineQueue {
    slot: JsonSlot<Vec<String>>,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            slot: JsonSlot::new(store, StoreKey::OfflineQueue),
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.slot.load().unwrap_or_default()
    }

    /// Append and persist. Duplicates are kept. Returns the new length.
    pub fn enqueue(&mut self, city: &str) -> Result<usize, StoreError> {
        let mut entries = self.entries();
        entries.push(city.to_string());
        self.slot.save(&entries)?;
        Ok(entries.len())
    }

    /// Remove and return every entry, oldest first.
    pub fn take_all(&mut self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries();
        self.slot.clear()?;
        Ok(entries)
    }
}

enum QueueCommand {
    Enqueue {
        city: String,
        reply: oneshot::Sender<Result<usize, StoreError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<String>>,
    },
    TakeAll {
        reply: oneshot::Sender<Result<Vec<String>, StoreError>>,
    },
}

/// Outcome of one drained entry.
#[derive(Debug)]
pub struct DrainOutcome<T, E> {
    pub city: String,
    pub result: Result<T, E>,
}

/// Cloneable access to the queue owner.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<QueueCommand>,
}

impl std::fmt::Debug for QueueCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enqueue { city, .. } => f.debug_struct("Enqueue").field("city", city).finish(),
            Self::Snapshot { .. } => f.write_str("Snapshot"),
            Self::TakeAll { .. } => f.write_str("TakeAll"),
        }
    }
}

impl QueueHandle {
    /// Spawn the owner task. It exits once every handle is dropped.
    pub fn spawn(queue: OfflineQueue) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(run_owner(queue, rx));
        (Self { tx }, task)
    }

    pub async fn enqueue(&self, city: &str) -> Result<usize, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.send(QueueCommand::Enqueue {
            city: city.to_string(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| QueueError::Closed)??)
    }

    /// Read-only copy of the pending entries.
    pub async fn snapshot(&self) -> Result<Vec<String>, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.send(QueueCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| QueueError::Closed)
    }

    pub async fn take_all(&self) -> Result<Vec<String>, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.send(QueueCommand::TakeAll { reply }).await?;
        Ok(rx.await.map_err(|_| QueueError::Closed)??)
    }

    /// Run `handler` over every queued entry, one at a time, in FIFO order.
    ///
    /// The queue is empty afterwards whatever the handler returned; failed
    /// entries are logged and dropped.
    pub async fn drain_and_process<T, E, F, Fut>(
        &self,
        mut handler: F,
    ) -> Result<Vec<DrainOutcome<T, E>>, QueueError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let entries = self.take_all().await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        info!(count = entries.len(), "Draining offline queue");

        let mut outcomes = Vec::with_capacity(entries.len());
        for city in entries {
            let result = handler(city.clone()).await;
            if let Err(err) = &result {
                warn!(%city, error = %err, "Queued search failed; dropping it");
            }
            outcomes.push(DrainOutcome { city, result });
        }
        Ok(outcomes)
    }

    async fn send(&self, cmd: QueueCommand) -> Result<(), QueueError> {
        self.tx.send(cmd).await.map_err(|_| QueueError::Closed)
    }
}

async fn run_owner(mut queue: OfflineQueue, mut rx: mpsc::Receiver<QueueCommand>) {
    while let Some(cmd) = rx.recv().await {
        debug!(?cmd, "Offline queue command");
        // A dropped reply receiver just means the caller stopped waiting.
        match cmd {
            QueueCommand::Enqueue { city, reply } => {
                let _ = reply.send(queue.enqueue(&city));
            }
            QueueCommand::Snapshot { reply } => {
                let _ = reply.send(queue.entries());
            }
            QueueCommand::TakeAll { reply } => {
                let _ = reply.send(queue.take_all());
            }
        }
    }
    debug!("Offline queue owner stopped");
}
