//! Write-through to the persistent store.
//!
//! A single worker per node drains a queue of keys. For each key it flushes
//! whatever version the cache holds at that moment, so repeated writes to a
//! key coalesce and reach the store in submission order. A key sits in the
//! queue at most once.
//!
//! While the store is degraded each key gets a single attempt instead of the
//! full retry budget; it stays dirty and the sweep offers it again later.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::health::HealthState;
use super::retry::RetryPolicy;
use crate::cache::{DistributedCache, Slot};
use crate::error::{GridError, Result};
use crate::store::DocumentStore;

enum FlushRequest {
    Key(String),
    Drain(oneshot::Sender<()>),
    Shutdown,
}

/// What a flush attempt did for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The cached version is now in the store
    Flushed,
    /// Nothing to do: key absent or already clean
    Clean,
    /// The store held a newer version, which replaced the cached one
    Reconciled,
}

/// Handle used to queue keys for the flush worker.
#[derive(Debug, Clone)]
pub struct FlushQueue {
    tx: mpsc::UnboundedSender<FlushRequest>,
    /// Keys sent to the worker and not yet picked up
    pending: Arc<Mutex<HashSet<String>>>,
}

impl FlushQueue {
    fn pending(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `key` unless it is already waiting.
    ///
    /// Returns true if the key was added, false if it was already queued or
    /// the worker has stopped.
    pub fn enqueue(&self, key: impl Into<String>) -> bool {
        let key = key.into();
        if !self.pending().insert(key.clone()) {
            return false;
        }
        if self.tx.send(FlushRequest::Key(key.clone())).is_err() {
            self.pending().remove(&key);
            return false;
        }
        true
    }

    /// Number of keys waiting for the worker.
    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until every key queued before this call has been attempted.
    pub async fn drain(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(FlushRequest::Drain(done_tx))
            .map_err(|_| GridError::Internal("flush worker stopped".to_string()))?;
        done_rx
            .await
            .map_err(|_| GridError::Internal("flush worker stopped".to_string()))
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(FlushRequest::Shutdown);
    }
}

/// Flushes dirty cache entries to the store.
pub struct WriteThrough {
    cache: Arc<DistributedCache>,
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    health: Arc<HealthState>,
}

impl WriteThrough {
    pub fn new(
        cache: Arc<DistributedCache>,
        store: Arc<dyn DocumentStore>,
        retry: RetryPolicy,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            cache,
            store,
            retry,
            health,
        }
    }

    /// Persists the cached version of `key` if it is dirty.
    ///
    /// Safe to repeat: the store accepts the same version twice. On
    /// retry exhaustion the entry stays dirty for the next sweep.
    pub async fn flush_key(&self, key: &str) -> Result<FlushOutcome> {
        let Some(entry) = self.cache.peek(key).await else {
            return Ok(FlushOutcome::Clean);
        };
        if !entry.dirty {
            return Ok(FlushOutcome::Clean);
        }

        // One attempt while degraded; the sweep brings the key back.
        let retry = if self.health.is_degraded() {
            self.retry.single_attempt()
        } else {
            self.retry.clone()
        };

        let stamp = entry.stamp();
        let result = match &entry.slot {
            Slot::Live(record) => {
                retry
                    .execute("flush put", || self.store.put(key, record))
                    .await
            }
            Slot::Tombstone(stamp) => retry
                .execute("flush delete", || async {
                    self.store.delete_versioned(key, stamp).await.map(|_| ())
                })
                .await,
        };

        match result {
            Ok(()) => {
                self.health.record_store_success();
                self.health.record_flushed();
                self.cache.mark_clean(key, &stamp).await;
                debug!("Flushed {} at version {}", key, stamp.version);
                Ok(FlushOutcome::Flushed)
            }
            Err(GridError::Conflict { stored, attempted, .. }) => {
                self.health.record_store_success();
                self.health.record_conflict();
                info!(
                    "Store holds newer {} (version {} > {}), reconciling",
                    key, stored, attempted
                );
                self.reconcile(key).await?;
                Ok(FlushOutcome::Reconciled)
            }
            Err(e) => {
                if e.is_retryable() {
                    self.health.record_store_failure();
                }
                self.health.record_flush_failed();
                Err(e)
            }
        }
    }

    /// Replaces the cached entry with the store's newer version.
    async fn reconcile(&self, key: &str) -> Result<()> {
        let stored = self
            .retry
            .execute("reconcile fetch", || self.store.get(key))
            .await?;
        if let Some(record) = stored {
            let route = self.cache.route(key).await;
            self.cache.populate(record, &route).await?;
        }
        Ok(())
    }
}

/// Starts the flush worker and returns its queue.
pub fn spawn_flush_worker(write_through: Arc<WriteThrough>) -> (FlushQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = FlushQueue {
        tx,
        pending: Arc::new(Mutex::new(HashSet::new())),
    };
    let pending = queue.pending.clone();

    let handle = tokio::spawn(async move {
        info!("Flush worker started");
        while let Some(request) = rx.recv().await {
            match request {
                FlushRequest::Key(key) => {
                    // Writes landing during the flush queue the key again.
                    pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&key);
                    if let Err(e) = write_through.flush_key(&key).await {
                        warn!("Flush of {} failed, keeping it dirty: {}", key, e);
                    }
                }
                FlushRequest::Drain(done) => {
                    let _ = done.send(());
                }
                FlushRequest::Shutdown => break,
            }
        }
        info!("Flush worker stopped");
    });

    (queue, handle)
}
