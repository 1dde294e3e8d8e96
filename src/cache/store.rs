//! Cache Store Module
//!
//! One replica's share of the grid: a HashMap of entries with LRU tracking,
//! TTL expiry and last-writer-wins application of incoming versions.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::error::{GridError, Result};
use crate::record::{current_timestamp_ms, validate_grid_key, Record, Stamp};

/// How long a flushed tombstone is kept after its version time.
///
/// While it is held, a store read that raced the delete cannot reinstall
/// the deleted record.
pub const TOMBSTONE_GRACE_MS: u64 = 60_000;

// == Read Result ==
/// Outcome of looking a key up in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead {
    /// Live, unexpired record
    Hit(Record),
    /// Key was deleted or expired and the store must not be consulted
    Tombstone,
    /// Nothing cached for this key
    Miss,
}

// == Write Result ==
/// What applying an entry did to the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Key was absent (or only a tombstone) and now holds the entry
    Inserted,
    /// An older entry was replaced
    Updated,
    /// The same version was already present
    Unchanged,
    /// A newer version is already present; nothing changed
    Superseded,
}

// == Cache Store ==
/// Replica-local cache storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
        }
    }

    // == Apply ==
    /// Applies `entry` under last-writer-wins.
    ///
    /// At capacity the least recently used clean entry is evicted. Dirty
    /// entries, tombstones included, are pinned until the store has them.
    pub fn apply(&mut self, key: &str, entry: CacheEntry) -> Result<WriteOutcome> {
        validate_grid_key(key)?;

        if let Some(existing) = self.entries.get_mut(key) {
            let outcome = match entry.precedence(existing) {
                Ordering::Less => WriteOutcome::Superseded,
                Ordering::Equal => {
                    // Either side being clean means the store has this version.
                    existing.dirty = existing.dirty && entry.dirty;
                    WriteOutcome::Unchanged
                }
                Ordering::Greater => {
                    let revived = existing.is_tombstone() && !entry.is_tombstone();
                    *existing = entry;
                    if revived {
                        WriteOutcome::Inserted
                    } else {
                        WriteOutcome::Updated
                    }
                }
            };
            if outcome != WriteOutcome::Superseded {
                self.lru.touch(key);
            }
            return Ok(outcome);
        }

        if self.entries.len() >= self.max_entries {
            let entries = &self.entries;
            let evicted = self
                .lru
                .evict_oldest(|k| entries.get(k).map_or(true, |e| !e.dirty));
            match evicted {
                Some(evicted_key) => {
                    self.entries.remove(&evicted_key);
                    self.stats.record_eviction();
                }
                None => {
                    return Err(GridError::CacheFull(format!(
                        "all {} entries are awaiting write-through",
                        self.entries.len()
                    )));
                }
            }
        }

        self.entries.insert(key.to_string(), entry);
        self.lru.touch(key);
        Ok(WriteOutcome::Inserted)
    }

    // == Read ==
    /// Looks up `key`, recording a hit or a miss.
    ///
    /// An expired record is turned into a dirty tombstone on the spot so the
    /// store copy gets deleted too.
    pub fn read(&mut self, key: &str) -> CacheRead {
        let Some(entry) = self.entries.get_mut(key) else {
            self.stats.record_miss();
            return CacheRead::Miss;
        };

        if entry.is_expired() {
            entry.expire();
            self.stats.record_expiration();
            self.stats.record_miss();
            return CacheRead::Tombstone;
        }

        match entry.record() {
            Some(record) => {
                let record = record.clone();
                self.stats.record_hit();
                self.lru.touch(key);
                CacheRead::Hit(record)
            }
            None => {
                self.stats.record_miss();
                CacheRead::Tombstone
            }
        }
    }

    /// Returns the entry for `key` without touching stats or LRU order.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Mark Clean ==
    /// Records that the store holds `stamp` for `key`.
    ///
    /// Does nothing if the entry has moved on to another version. A flushed
    /// tombstone stays as a clean entry until [`TOMBSTONE_GRACE_MS`] has
    /// passed or it is evicted.
    pub fn mark_clean(&mut self, key: &str, stamp: &Stamp) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if &entry.stamp() != stamp {
            return false;
        }
        entry.dirty = false;
        true
    }

    // == Remove ==
    /// Drops `key` regardless of its state.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.lru.remove(key);
        self.entries.remove(key)
    }

    /// Keys whose current entry has not reached the store.
    pub fn dirty_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Keys holding live, unexpired records.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_tombstone() && !entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Clones every entry whose key satisfies `filter`.
    pub fn entries_where<F>(&self, filter: F) -> Vec<(String, CacheEntry)>
    where
        F: Fn(&str) -> bool,
    {
        self.entries
            .iter()
            .filter(|(key, _)| filter(key.as_str()))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Drops every entry whose key does not satisfy `keep`.
    pub fn retain_keys<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let dropped: Vec<String> = self
            .entries
            .keys()
            .filter(|key| !keep(key.as_str()))
            .cloned()
            .collect();
        for key in &dropped {
            self.remove(key);
        }
        dropped.len()
    }

    /// Forgets everything, as a crashed member would.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru = LruTracker::new();
    }

    // == Cleanup Expired ==
    /// Retires every expired record and returns the affected keys.
    ///
    /// Also forgets flushed tombstones older than [`TOMBSTONE_GRACE_MS`].
    pub fn cleanup_expired(&mut self) -> Vec<String> {
        self.purge_tombstones(current_timestamp_ms());

        let mut expired = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if entry.is_expired() {
                entry.expire();
                self.stats.record_expiration();
                expired.push(key.clone());
            }
        }
        expired
    }

    /// Drops clean tombstones whose version time is older than the grace
    /// period relative to `now_ms`. Returns how many were dropped.
    pub fn purge_tombstones(&mut self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(TOMBSTONE_GRACE_MS);
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.is_tombstone() && !entry.dirty && entry.stamp().version < cutoff
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.remove(key);
        }
        stale.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.dirty_entries = self.entries.values().filter(|e| e.dirty).count();
        stats.tombstones = self.entries.values().filter(|e| e.is_tombstone()).count();
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    fn record(key: &str, value: &str, version: u64) -> Record {
        Record::new(key, json!(value), Stamp::new(version, "n1"), None)
    }

    fn put(store: &mut CacheStore, key: &str, value: &str, version: u64) -> WriteOutcome {
        store
            .apply(key, CacheEntry::dirty(record(key, value, version)))
            .unwrap()
    }

    #[test]
    fn test_store_new() {
        let store = CacheStore::new(100);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_apply_and_read() {
        let mut store = CacheStore::new(100);

        assert_eq!(put(&mut store, "key1", "value1", 1), WriteOutcome::Inserted);

        assert_eq!(store.read("key1"), CacheRead::Hit(record("key1", "value1", 1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_read_missing() {
        let mut store = CacheStore::new(100);
        assert_eq!(store.read("nonexistent"), CacheRead::Miss);
    }

    #[test]
    fn test_newer_version_wins_regardless_of_order() {
        let mut store = CacheStore::new(100);

        assert_eq!(put(&mut store, "k", "new", 2), WriteOutcome::Inserted);
        assert_eq!(put(&mut store, "k", "old", 1), WriteOutcome::Superseded);
        assert_eq!(store.read("k"), CacheRead::Hit(record("k", "new", 2)));

        assert_eq!(put(&mut store, "k", "newer", 3), WriteOutcome::Updated);
        assert_eq!(store.read("k"), CacheRead::Hit(record("k", "newer", 3)));
    }

    #[test]
    fn test_same_version_replay_is_unchanged() {
        let mut store = CacheStore::new(100);
        put(&mut store, "k", "v", 1);
        store.mark_clean("k", &Stamp::new(1, "n1"));

        assert_eq!(put(&mut store, "k", "v", 1), WriteOutcome::Unchanged);
        assert!(!store.peek("k").unwrap().dirty);
    }

    #[test]
    fn test_tombstone_hides_record() {
        let mut store = CacheStore::new(100);
        put(&mut store, "k", "v", 1);

        let outcome = store
            .apply("k", CacheEntry::tombstone(Stamp::new(2, "n1")))
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);
        assert_eq!(store.read("k"), CacheRead::Tombstone);
        assert!(store.keys().is_empty());

        assert_eq!(put(&mut store, "k", "back", 3), WriteOutcome::Inserted);
        assert_eq!(store.read("k"), CacheRead::Hit(record("k", "back", 3)));
    }

    #[test]
    fn test_mark_clean_matches_version() {
        let mut store = CacheStore::new(100);
        put(&mut store, "k", "v1", 1);
        put(&mut store, "k", "v2", 2);

        assert!(!store.mark_clean("k", &Stamp::new(1, "n1")));
        assert!(store.peek("k").unwrap().dirty);

        assert!(store.mark_clean("k", &Stamp::new(2, "n1")));
        assert!(!store.peek("k").unwrap().dirty);
        assert!(store.dirty_keys().is_empty());
    }

    #[test]
    fn test_flushed_tombstone_blocks_stale_populate() {
        let mut store = CacheStore::new(100);
        store
            .apply("k", CacheEntry::tombstone(Stamp::new(4, "n1")))
            .unwrap();

        assert!(store.mark_clean("k", &Stamp::new(4, "n1")));
        assert!(store.dirty_keys().is_empty());
        assert_eq!(store.read("k"), CacheRead::Tombstone);

        // A store read issued before the delete arrives late.
        let stale = store.apply("k", CacheEntry::clean(record("k", "old", 3)));
        assert_eq!(stale.unwrap(), WriteOutcome::Superseded);
        assert_eq!(store.read("k"), CacheRead::Tombstone);
    }

    #[test]
    fn test_purge_tombstones_after_grace() {
        let mut store = CacheStore::new(100);
        let now = 1_000_000;
        store
            .apply("old", CacheEntry::tombstone(Stamp::new(now - TOMBSTONE_GRACE_MS - 1, "n1")))
            .unwrap();
        store
            .apply("recent", CacheEntry::tombstone(Stamp::new(now - 10, "n1")))
            .unwrap();
        store
            .apply("pending", CacheEntry::tombstone(Stamp::new(1, "n1")))
            .unwrap();
        store.mark_clean("old", &Stamp::new(now - TOMBSTONE_GRACE_MS - 1, "n1"));
        store.mark_clean("recent", &Stamp::new(now - 10, "n1"));

        assert_eq!(store.purge_tombstones(now), 1);
        assert!(store.peek("old").is_none());
        assert!(store.peek("recent").is_some());
        // Not flushed yet, so kept whatever its age.
        assert!(store.peek("pending").is_some());
    }

    #[test]
    fn test_clean_tombstone_is_evictable() {
        let mut store = CacheStore::new(1);
        store
            .apply("gone", CacheEntry::tombstone(Stamp::new(1, "n1")))
            .unwrap();
        store.mark_clean("gone", &Stamp::new(1, "n1"));

        assert_eq!(put(&mut store, "k", "v", 2), WriteOutcome::Inserted);
        assert!(store.peek("gone").is_none());
    }

    #[test]
    fn test_store_lru_evicts_clean_entries_only() {
        let mut store = CacheStore::new(3);

        put(&mut store, "key1", "v", 1);
        put(&mut store, "key2", "v", 2);
        put(&mut store, "key3", "v", 3);
        store.mark_clean("key2", &Stamp::new(2, "n1"));

        // key1 is older but dirty, so key2 goes.
        put(&mut store, "key4", "v", 4);

        assert_eq!(store.len(), 3);
        assert_eq!(store.read("key2"), CacheRead::Miss);
        assert!(matches!(store.read("key1"), CacheRead::Hit(_)));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_full_of_dirty_entries() {
        let mut store = CacheStore::new(2);
        put(&mut store, "a", "v", 1);
        put(&mut store, "b", "v", 2);

        let result = store.apply("c", CacheEntry::dirty(record("c", "v", 3)));
        assert!(matches!(result, Err(GridError::CacheFull(_))));
    }

    #[test]
    fn test_store_lru_touch_on_read() {
        let mut store = CacheStore::new(3);
        for (i, key) in ["key1", "key2", "key3"].iter().enumerate() {
            store
                .apply(key, CacheEntry::clean(record(key, "v", i as u64 + 1)))
                .unwrap();
        }

        store.read("key1");
        store
            .apply("key4", CacheEntry::clean(record("key4", "v", 9)))
            .unwrap();

        assert!(matches!(store.read("key1"), CacheRead::Hit(_)));
        assert_eq!(store.read("key2"), CacheRead::Miss);
    }

    #[test]
    fn test_expired_read_becomes_tombstone() {
        let mut store = CacheStore::new(100);
        let expiring = Record::new("k", json!("v"), Stamp::new(1, "n1"), Some(1));
        store.apply("k", CacheEntry::clean(expiring)).unwrap();

        sleep(Duration::from_millis(1100));

        assert_eq!(store.read("k"), CacheRead::Tombstone);
        assert_eq!(store.dirty_keys(), vec!["k".to_string()]);
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let mut store = CacheStore::new(100);
        let short = Record::new("key1", json!("v"), Stamp::new(1, "n1"), Some(1));
        let long = Record::new("key2", json!("v"), Stamp::new(2, "n1"), Some(10));
        store.apply("key1", CacheEntry::clean(short)).unwrap();
        store.apply("key2", CacheEntry::clean(long)).unwrap();

        sleep(Duration::from_millis(1100));

        assert_eq!(store.cleanup_expired(), vec!["key1".to_string()]);
        assert_eq!(store.keys(), vec!["key2".to_string()]);
        assert!(store.peek("key1").unwrap().is_tombstone());
    }

    #[test]
    fn test_store_stats() {
        let mut store = CacheStore::new(100);

        put(&mut store, "key1", "value1", 1);
        store.read("key1");
        store.read("nonexistent");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.dirty_entries, 1);
    }

    #[test]
    fn test_retain_and_clear() {
        let mut store = CacheStore::new(100);
        put(&mut store, "a", "v", 1);
        put(&mut store, "b", "v", 2);

        assert_eq!(store.retain_keys(|k| k == "a"), 1);
        assert_eq!(store.keys(), vec!["a".to_string()]);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_key_too_long() {
        let mut store = CacheStore::new(100);
        let long_key = "x".repeat(crate::record::MAX_GRID_KEY_LENGTH + 1);
        let result = store.apply(&long_key, CacheEntry::dirty(record("k", "v", 1)));
        assert!(matches!(result, Err(GridError::InvalidRequest(_))));
    }
}
