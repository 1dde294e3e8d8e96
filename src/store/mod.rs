//! Persistent Store Module
//!
//! Durable document storage behind a swappable capability trait.
//!
//! # Backends
//! - [`MemoryDocumentStore`]: process-local documents, with an availability
//!   switch used to simulate outages
//! - [`FileDocumentStore`]: one JSON document per key under a data directory

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::error::{GridError, Result};
use crate::record::{Record, Stamp};

pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;

// == Document Store ==
/// Capability interface for durable record storage.
///
/// Failures are `StoreUnavailable` (transient) or `Conflict` (the store
/// already holds a newer version). A missing key is `Ok(None)`.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Upserts `record` unless the stored version supersedes it.
    async fn put(&self, key: &str, record: &Record) -> Result<()>;

    /// Fetches the record stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Removes `key` unconditionally. Returns whether a document existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Removes `key` unless the stored version supersedes `stamp`.
    ///
    /// The default implementation is a read followed by a delete; backends
    /// that can do it under one lock should override it.
    async fn delete_versioned(&self, key: &str, stamp: &Stamp) -> Result<bool> {
        if let Some(stored) = self.get(key).await? {
            ensure_not_newer(key, &stored, stamp)?;
        }
        self.delete(key).await
    }

    /// Lists every stored key.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

/// Fails with `Conflict` if `stored` wins over `incoming`.
pub(crate) fn ensure_not_newer(key: &str, stored: &Record, incoming: &Stamp) -> Result<()> {
    if stored.supersedes(incoming) {
        return Err(GridError::Conflict {
            key: key.to_string(),
            stored: stored.version,
            attempted: incoming.version,
        });
    }
    Ok(())
}

/// Builds the backend selected in the configuration.
pub fn from_config(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match config.store_backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
        StoreBackend::File => Ok(Arc::new(FileDocumentStore::new(&config.data_dir)?)),
    }
}
