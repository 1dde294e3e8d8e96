//! In-memory document store.
//!
//! Documents are kept encoded, exactly as a remote store would hold them.
//! The availability switch and failure budget let callers exercise the
//! retry and degraded paths without a real network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ensure_not_newer, DocumentStore};
use crate::codec::{decode_document, encode_document};
use crate::error::{GridError, Result};
use crate::record::{Record, Stamp};

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, Vec<u8>>>,
    offline: AtomicBool,
    /// Number of upcoming calls that fail before the store recovers.
    failures_left: AtomicU32,
    /// Successful writes (puts and deletes).
    writes: AtomicU64,
    /// Calls refused while offline or failing.
    rejected: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the store offline (`false`) or back online (`true`).
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail with `StoreUnavailable`.
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Number of successful puts and deletes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of calls refused as unavailable so far.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(GridError::StoreUnavailable("store is offline".to_string()));
        }
        let consumed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(GridError::StoreUnavailable("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, key: &str, record: &Record) -> Result<()> {
        self.check_available()?;
        let encoded = encode_document(record)?;

        let mut documents = self.documents.write().await;
        if let Some(existing) = documents.get(key) {
            let stored = decode_document(existing)?;
            ensure_not_newer(key, &stored, &record.stamp())?;
        }
        documents.insert(key.to_string(), encoded);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Record>> {
        self.check_available()?;
        let documents = self.documents.read().await;
        documents.get(key).map(|bytes| decode_document(bytes)).transpose()
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        let existed = self.documents.write().await.remove(key).is_some();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(existed)
    }

    async fn delete_versioned(&self, key: &str, stamp: &Stamp) -> Result<bool> {
        self.check_available()?;
        let mut documents = self.documents.write().await;
        if let Some(existing) = documents.get(key) {
            let stored = decode_document(existing)?;
            ensure_not_newer(key, &stored, stamp)?;
        }
        let existed = documents.remove(key).is_some();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(existed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.check_available()?;
        let mut keys: Vec<String> = self.documents.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
