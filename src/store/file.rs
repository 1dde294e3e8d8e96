//! File-backed document store.
//!
//! Each record is one pretty-printed JSON document under the data
//! directory. File names are the hex SHA-256 digest of the key, so every
//! key maps to a flat file of fixed name length; the key itself lives in the
//! document's `_id`. Writes go to a temp file, are fsynced, then renamed
//! into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ensure_not_newer, DocumentStore};
use crate::codec::{decode_document, encode_document};
use crate::error::{GridError, Result};
use crate::record::{Record, Stamp};

const DOCUMENT_EXT: &str = "json";

/// Stores documents as files under a root directory.
#[derive(Debug)]
pub struct FileDocumentStore {
    root: PathBuf,
    /// Serializes read-check-write sequences.
    write_lock: Mutex<()>,
}

impl FileDocumentStore {
    /// Creates the store, creating `root` if it does not exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(".tmp")).map_err(unavailable)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key_digest(key), DOCUMENT_EXT))
    }

    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(format!("tmp-{}", uuid::Uuid::new_v4()))
    }

    /// Temp file, fsync, rename.
    async fn write_atomic(&self, final_path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = self.temp_path();
        let mut file = fs::File::create(&tmp_path).await.map_err(unavailable)?;
        file.write_all(bytes).await.map_err(unavailable)?;
        file.sync_all().await.map_err(unavailable)?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(unavailable(e));
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Record>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => decode_document(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(unavailable(e)),
        }
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn put(&self, key: &str, record: &Record) -> Result<()> {
        let encoded = encode_document(record)?;
        let _guard = self.write_lock.lock().await;

        if let Some(stored) = self.read(key).await? {
            ensure_not_newer(key, &stored, &record.stamp())?;
        }

        self.write_atomic(&self.path_for(key), &encoded).await?;

        debug!("Persisted {} (version {})", key, record.version);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Record>> {
        self.read(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.remove(key).await
    }

    async fn delete_versioned(&self, key: &str, stamp: &Stamp) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if let Some(stored) = self.read(key).await? {
            ensure_not_newer(key, &stored, stamp)?;
        }
        self.remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = fs::read_dir(&self.root).await.map_err(unavailable)?;
        let mut keys = Vec::new();

        while let Some(entry) = dir.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXT) {
                continue;
            }
            let bytes = fs::read(&path).await.map_err(unavailable)?;
            keys.push(decode_document(&bytes)?.key);
        }

        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        fs::metadata(&self.root)
            .await
            .map(|_| ())
            .map_err(unavailable)
    }
}

fn unavailable(err: std::io::Error) -> GridError {
    GridError::StoreUnavailable(err.to_string())
}

fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(key: &str, version: u64) -> Record {
        Record::new(key, json!({"name": "A"}), Stamp::new(version, "node-1"), None)
    }

    #[test]
    fn test_key_digest_is_fixed_length() {
        assert_eq!(key_digest("a").len(), 64);
        assert_eq!(key_digest(&"k".repeat(256)).len(), 64);
        assert_ne!(key_digest("a"), key_digest("b"));
    }

    #[tokio::test]
    async fn test_longest_key_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();
        let key = "k".repeat(crate::record::MAX_GRID_KEY_LENGTH);

        store.put(&key, &record(&key, 1)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(record(&key, 1)));
        assert_eq!(store.keys().await.unwrap(), vec![key.clone()]);
        assert!(store.delete_versioned(&key, &Stamp::new(2, "node-1")).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_leave_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();

        store.put("k", &record("k", 1)).await.unwrap();
        store.put("k", &record("k", 2)).await.unwrap();

        let leftovers = std::fs::read_dir(dir.path().join(".tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
        assert_eq!(store.get("k").await.unwrap(), Some(record("k", 2)));
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();

        store.put("user:1", &record("user:1", 1)).await.unwrap();
        assert_eq!(store.get("user:1").await.unwrap(), Some(record("user:1", 1)));

        assert!(store.delete("user:1").await.unwrap());
        assert_eq!(store.get("user:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileDocumentStore::new(dir.path()).unwrap();
            store.put("a/b", &record("a/b", 7)).await.unwrap();
        }

        let store = FileDocumentStore::new(dir.path()).unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), Some(record("a/b", 7)));
        assert_eq!(store.keys().await.unwrap(), vec!["a/b"]);
    }

    #[tokio::test]
    async fn test_older_put_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();

        store.put("k", &record("k", 9)).await.unwrap();
        let result = store.put("k", &record("k", 8)).await;
        assert!(matches!(result, Err(GridError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();
        std::fs::write(store.path_for("bad"), b"{oops").unwrap();

        assert!(matches!(store.get("bad").await, Err(GridError::MalformedData(_))));
    }
}
