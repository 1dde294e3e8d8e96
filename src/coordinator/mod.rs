//! Coordinator Module
//!
//! Ties the distributed cache to the persistent store for one node.
//!
//! # Read path
//! `ROUTE -> CACHE_CHECK -> HIT -> RETURN`, or on a miss
//! `STORE_FETCH -> POPULATE_CACHE -> RETURN` when the store has the key and
//! `RETURN_EMPTY` when it does not. A cached tombstone answers empty without
//! touching the store.
//!
//! # Write path
//! `ROUTE -> CACHE_WRITE -> ENQUEUE_FLUSH -> RETURN`. The store is updated
//! asynchronously by the flush worker, see [`flush`].
//!
//! Operations here take grid keys. Named maps scope keys on top of them,
//! see [`map`].

pub mod flush;
pub mod health;
pub mod map;
pub mod retry;

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use flush::{spawn_flush_worker, FlushOutcome, FlushQueue, WriteThrough};
pub use health::{FlushStats, HealthState, HealthStatus};
pub use map::GridMap;
pub use retry::RetryPolicy;

use crate::cache::{CacheRead, CacheStats, DistributedCache, EntryEvent, ReplicaSummary};
use crate::cluster::{ClusterMember, HybridClock, MemberId, MemberState, Membership, Ownership};
use crate::codec;
use crate::config::Config;
use crate::error::{GridError, Result};
use crate::record::{split_scoped_key, validate_grid_key, validate_map_name, Record};
use crate::store::DocumentStore;

/// Cache and write-through counters for one node.
#[derive(Debug, Clone, Serialize)]
pub struct GridStats {
    pub cache: CacheStats,
    pub flush: FlushStats,
}

/// A member together with the partitions it owns.
#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    #[serde(flatten)]
    pub member: ClusterMember,
    pub ownership: Ownership,
    pub replica: Option<ReplicaSummary>,
}

/// Snapshot of the cluster as seen by this node.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterView {
    pub local: MemberId,
    pub generation: u64,
    pub partition_count: u32,
    pub replication_factor: usize,
    pub members: Vec<MemberView>,
}

/// Entry point for cache operations on one node.
pub struct Coordinator {
    membership: Arc<Membership>,
    cache: Arc<DistributedCache>,
    store: Arc<dyn DocumentStore>,
    clock: HybridClock,
    retry: RetryPolicy,
    health: Arc<HealthState>,
    flush: FlushQueue,
    worker: Mutex<Option<JoinHandle<()>>>,
    default_ttl: Option<u64>,
}

impl Coordinator {
    // == Lifecycle ==
    /// Builds the node, starts its flush worker and joins the configured peers.
    pub async fn start(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Arc<Self>> {
        config.validate()?;

        let local_id = MemberId::new(config.node_id.clone());
        let local = ClusterMember::new(local_id.clone(), config.node_address);
        let membership = Arc::new(Membership::new(
            local,
            config.partition_count,
            config.replication_factor,
        ));
        let cache = Arc::new(
            DistributedCache::new(membership.clone(), config.max_entries, config.write_quorum)
                .await,
        );
        let retry = RetryPolicy::new(
            config.flush_max_attempts,
            Duration::from_millis(config.flush_initial_backoff_ms),
            Duration::from_millis(config.flush_max_backoff_ms),
        );
        let health = Arc::new(HealthState::new());

        let write_through = Arc::new(WriteThrough::new(
            cache.clone(),
            store.clone(),
            retry.clone(),
            health.clone(),
        ));
        let (flush, worker) = spawn_flush_worker(write_through);

        let coordinator = Arc::new(Self {
            membership,
            cache,
            store,
            clock: HybridClock::new(local_id.clone()),
            retry,
            health,
            flush,
            worker: Mutex::new(Some(worker)),
            default_ttl: config.default_ttl(),
        });

        for peer in &config.peers {
            coordinator
                .join(MemberId::new(peer.id.clone()), peer.address)
                .await?;
        }

        info!(
            "Node {} started: {} partitions, replication factor {}, write quorum {}",
            local_id, config.partition_count, config.replication_factor, config.write_quorum
        );
        Ok(coordinator)
    }

    /// Flushes everything queued so far and stops the flush worker.
    pub async fn shutdown(&self) {
        let dirty = self.sweep_dirty().await;
        if let Err(e) = self.flush.drain().await {
            warn!("Could not drain flush queue: {}", e);
        }
        self.flush.shutdown();
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                warn!("Flush worker ended abnormally: {}", e);
            }
        }
        info!("Coordinator stopped after re-queueing {} dirty entries", dirty);
    }

    pub fn local_id(&self) -> &MemberId {
        self.membership.local_id()
    }

    // == Read ==
    /// Returns the live record for `key`, loading it from the store on a miss.
    pub async fn get(&self, key: &str) -> Result<Option<Record>> {
        validate_grid_key(key)?;
        let route = self.cache.route(key).await;

        match self.cache.read_routed(key, &route).await? {
            CacheRead::Hit(record) => return Ok(Some(record)),
            CacheRead::Tombstone => return Ok(None),
            CacheRead::Miss => {}
        }

        let fetched = self.fetch(key).await?;
        let Some(record) = fetched.filter(|record| !record.is_expired()) else {
            debug!("{} not found in store", key);
            return Ok(None);
        };

        self.clock.observe(record.version);
        if let Err(e) = self.cache.populate(record.clone(), &route).await {
            warn!("Could not cache {} after store fetch: {}", key, e);
        }
        Ok(Some(record))
    }

    async fn fetch(&self, key: &str) -> Result<Option<Record>> {
        match self.retry.execute("store fetch", || self.store.get(key)).await {
            Ok(record) => {
                self.health.record_store_success();
                Ok(record)
            }
            Err(e) => {
                if e.is_retryable() {
                    self.health.record_store_failure();
                }
                Err(e)
            }
        }
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Live keys held in the cache or the store.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: BTreeSet<String> = self.cache.keys().await.into_iter().collect();

        let stored = match self.retry.execute("store keys", || self.store.keys()).await {
            Ok(stored) => {
                self.health.record_store_success();
                stored
            }
            Err(e) => {
                if e.is_retryable() {
                    self.health.record_store_failure();
                }
                return Err(e);
            }
        };

        for key in stored {
            if keys.contains(&key) {
                continue;
            }
            // A pending delete hides the stored copy.
            match self.cache.peek(&key).await {
                Some(entry) if entry.is_tombstone() || entry.is_expired() => {}
                _ => {
                    keys.insert(key);
                }
            }
        }
        Ok(keys.into_iter().collect())
    }

    // == Write ==
    /// Writes `value` under `key` and queues it for the store.
    ///
    /// Returns once a quorum of the key's owners hold the new record.
    pub async fn put(&self, key: &str, value: Value, ttl: Option<u64>) -> Result<Record> {
        validate_grid_key(key)?;
        let ttl = ttl.or(self.default_ttl);
        let record = Record::new(key, value, self.clock.tick(), ttl);
        self.write(record).await
    }

    /// Sets one top-level field of the document under `key`, keeping the
    /// rest of the document and its expiry. Returns None if the key does
    /// not exist.
    ///
    /// The read and the write are separate steps; concurrent updates of the
    /// same key resolve by last writer.
    pub async fn update_field(&self, key: &str, field: &str, value: Value) -> Result<Option<Record>> {
        if field.is_empty() {
            return Err(GridError::InvalidRequest("Field cannot be empty".to_string()));
        }
        let Some(current) = self.get(key).await? else {
            return Ok(None);
        };
        let Value::Object(mut document) = current.value else {
            return Err(GridError::InvalidRequest(format!(
                "Value of {} is not a JSON object",
                key
            )));
        };
        document.insert(field.to_string(), value);

        let mut record = Record::new(key, Value::Object(document), self.clock.tick(), None);
        record.expires_at = current.expires_at;
        self.write(record).await.map(Some)
    }

    async fn write(&self, record: Record) -> Result<Record> {
        codec::encode(&record)?;

        let route = self.cache.route(&record.key).await;
        let written = self.cache.write_routed(record.clone(), &route).await;
        self.track_quorum(route.partition, &written);
        written?;

        self.flush.enqueue(record.key.as_str());
        debug!("Wrote {} at version {}", record.key, record.version);
        Ok(record)
    }

    /// Deletes `key`. Returns false if it did not exist.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        if self.get(key).await?.is_none() {
            return Ok(false);
        }

        let partition = self.cache.route(key).await.partition;
        let removed = self.cache.tombstone(key, self.clock.tick()).await;
        self.track_quorum(partition, &removed);
        removed?;

        self.flush.enqueue(key);
        debug!("Deleted {}", key);
        Ok(true)
    }

    fn track_quorum<T>(&self, partition: u32, result: &Result<T>) {
        match result {
            Ok(_) => self.health.record_quorum(partition, true),
            Err(GridError::QuorumLost { partition, .. }) => {
                self.health.record_quorum(*partition, false)
            }
            Err(_) => {}
        }
    }

    /// Clears quorum loss for partitions that have enough online owners
    /// again after a membership change.
    async fn refresh_quorum(&self) {
        for partition in self.health.lost_partitions() {
            if self.cache.partition_has_quorum(partition).await {
                self.health.record_quorum(partition, true);
            }
        }
    }

    // == Maps ==
    /// Handle on the named map `name`.
    pub fn map(&self, name: &str) -> Result<GridMap<'_>> {
        validate_map_name(name)?;
        Ok(GridMap::new(self, name))
    }

    /// Names of the maps that hold at least one live key.
    pub async fn maps(&self) -> Result<Vec<String>> {
        let maps: BTreeSet<String> = self
            .keys()
            .await?
            .iter()
            .filter_map(|key| split_scoped_key(key))
            .map(|(map, _)| map.to_string())
            .collect();
        Ok(maps.into_iter().collect())
    }

    // == Write-through ==
    /// Waits until every flush queued so far has been attempted.
    pub async fn flush_pending(&self) -> Result<()> {
        self.flush.drain().await
    }

    /// Re-queues dirty entries not already waiting. Returns how many were
    /// queued.
    pub async fn sweep_dirty(&self) -> usize {
        let dirty = self.cache.dirty_keys().await;
        dirty
            .into_iter()
            .filter(|key| self.flush.enqueue(key.as_str()))
            .count()
    }

    /// Keys waiting for the flush worker.
    pub fn pending_flushes(&self) -> usize {
        self.flush.len()
    }

    /// Retires expired entries and queues their deletion from the store.
    pub async fn cleanup_expired(&self) -> usize {
        let expired = self.cache.cleanup_expired().await;
        for key in &expired {
            self.flush.enqueue(key.as_str());
        }
        expired.len()
    }

    // == Observability ==
    pub fn health(&self) -> HealthStatus {
        self.health.status()
    }

    pub fn is_degraded(&self) -> bool {
        self.health.is_degraded()
    }

    pub async fn stats(&self) -> GridStats {
        GridStats {
            cache: self.cache.stats().await,
            flush: self.health.flush_stats(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntryEvent> {
        self.cache.subscribe()
    }

    /// Checks that the persistent store answers.
    pub async fn ping_store(&self) -> Result<()> {
        self.store.ping().await
    }

    pub async fn cluster(&self) -> ClusterView {
        let table = self.membership.table().await;
        let summaries = self.cache.replica_summaries().await;
        let members = self
            .membership
            .members()
            .await
            .into_iter()
            .map(|member| MemberView {
                ownership: table.ownership(&member.id),
                replica: summaries.iter().find(|s| s.member == member.id).cloned(),
                member,
            })
            .collect();

        ClusterView {
            local: self.local_id().clone(),
            generation: table.generation(),
            partition_count: table.partition_count(),
            replication_factor: table.replication_factor(),
            members,
        }
    }

    // == Membership ==
    /// Adds a member and moves its share of the partitions onto it.
    pub async fn join(&self, id: MemberId, address: SocketAddr) -> Result<ClusterMember> {
        let mut writer = self.membership.writer().await;
        let member = ClusterMember::new(id, address);
        if self.membership.member(&member.id).await.is_some() {
            return Err(GridError::InvalidRequest(format!(
                "Member {} is already part of the cluster",
                member.id
            )));
        }

        self.cache.add_replica(&member.id).await;
        let change = writer.join(member.clone()).await?;
        self.cache.rebalance(&change).await;
        self.refresh_quorum().await;
        Ok(member)
    }

    /// Removes a member after handing its partitions to the survivors.
    pub async fn leave(&self, id: &MemberId) -> Result<()> {
        let mut writer = self.membership.writer().await;
        let change = writer.leave(id).await?;
        self.cache.rebalance(&change).await;
        self.cache.remove_replica(id).await;
        self.refresh_quorum().await;
        Ok(())
    }

    /// Simulates a member crash. Its partitions keep their ownership, so
    /// writes to them run with fewer acknowledgements.
    pub async fn mark_down(&self, id: &MemberId) -> Result<ClusterMember> {
        if id == self.local_id() {
            return Err(GridError::InvalidRequest(
                "The local member cannot be marked down".to_string(),
            ));
        }
        let mut writer = self.membership.writer().await;
        let member = writer.set_state(id, MemberState::Down).await?;
        self.cache.take_offline(id).await?;
        Ok(member)
    }

    /// Restarts a crashed member and resynchronises it from its peers.
    pub async fn mark_up(&self, id: &MemberId) -> Result<ClusterMember> {
        let mut writer = self.membership.writer().await;
        let member = writer.set_state(id, MemberState::Alive).await?;
        self.cache.bring_online(id).await?;
        self.refresh_quorum().await;
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntryEventKind;
    use crate::config::PeerConfig;
    use crate::record::Stamp;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            partition_count: 16,
            flush_max_attempts: 3,
            flush_initial_backoff_ms: 1,
            flush_max_backoff_ms: 2,
            default_ttl: 0,
            ..Config::default()
        }
    }

    async fn node(config: Config) -> (Arc<Coordinator>, Arc<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let coordinator = Coordinator::start(&config, store.clone()).await.unwrap();
        (coordinator, store)
    }

    fn peer(id: &str, port: u16) -> PeerConfig {
        PeerConfig {
            id: id.to_string(),
            address: format!("127.0.0.1:{}", port).parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let (node, _) = node(test_config()).await;

        node.put("user:1", json!({"name": "A"}), None).await.unwrap();
        let record = node.get("user:1").await.unwrap().unwrap();
        assert_eq!(record.value, json!({"name": "A"}));

        assert!(node.delete("user:1").await.unwrap());
        assert_eq!(node.get("user:1").await.unwrap(), None);
        assert!(!node.delete("user:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_through_reaches_store() {
        let (node, store) = node(test_config()).await;

        let written = node.put("k", json!(1), None).await.unwrap();
        node.flush_pending().await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(written));

        node.delete("k").await.unwrap();
        node.flush_pending().await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_miss_loads_from_store_then_hits() {
        let (node, store) = node(test_config()).await;
        let stored = Record::new("k", json!("persisted"), Stamp::new(42, "node-9"), None);
        store.put("k", &stored).await.unwrap();

        assert_eq!(node.get("k").await.unwrap(), Some(stored.clone()));
        assert_eq!(node.get("k").await.unwrap(), Some(stored));

        let stats = node.stats().await;
        assert_eq!(stats.cache.misses, 1);
        assert_eq!(stats.cache.hits, 1);
    }

    #[tokio::test]
    async fn test_expired_store_document_is_not_found() {
        let (node, store) = node(test_config()).await;
        let mut stale = Record::new("k", json!(1), Stamp::new(1, "node-1"), None);
        stale.expires_at = Some(1);
        store.put("k", &stale).await.unwrap();

        assert_eq!(node.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_later_write_wins() {
        let (node, store) = node(test_config()).await;

        let first = node.put("k", json!("t1"), None).await.unwrap();
        let second = node.put("k", json!("t2"), None).await.unwrap();
        assert!(second.version > first.version);

        node.flush_pending().await.unwrap();
        assert_eq!(node.get("k").await.unwrap().unwrap().value, json!("t2"));
        assert_eq!(store.get("k").await.unwrap().unwrap().value, json!("t2"));
    }

    #[tokio::test]
    async fn test_store_outage_degrades_then_recovers() {
        let (node, store) = node(test_config()).await;
        store.set_available(false);

        node.put("k", json!(1), None).await.unwrap();
        node.flush_pending().await.unwrap();
        assert_eq!(node.health(), HealthStatus::Degraded);

        // Cached data stays readable while the store is down.
        assert_eq!(node.get("k").await.unwrap().unwrap().value, json!(1));
        assert!(matches!(
            node.get("other").await,
            Err(GridError::StoreUnavailable(_))
        ));

        store.set_available(true);
        assert_eq!(node.sweep_dirty().await, 1);
        node.flush_pending().await.unwrap();
        assert_eq!(node.health(), HealthStatus::Healthy);
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_quorum_loss_is_reported() {
        let config = Config {
            replication_factor: 2,
            write_quorum: 2,
            peers: vec![peer("node-2", 3001)],
            ..test_config()
        };
        let (node, _) = node(config).await;

        node.mark_down(&MemberId::new("node-2")).await.unwrap();
        let result = node.put("k", json!(1), None).await;
        assert!(matches!(result, Err(GridError::QuorumLost { .. })));
        assert_eq!(node.health(), HealthStatus::QuorumLost);

        node.mark_up(&MemberId::new("node-2")).await.unwrap();
        node.put("k", json!(2), None).await.unwrap();
        assert_eq!(node.health(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_quorum_loss_stays_reported_across_partitions() {
        let config = Config {
            replication_factor: 2,
            write_quorum: 2,
            peers: vec![peer("node-2", 3001), peer("node-3", 3002)],
            ..test_config()
        };
        let (node, _) = node(config).await;
        let down = MemberId::new("node-3");
        node.mark_down(&down).await.unwrap();

        let mut affected = None;
        let mut unaffected = None;
        for i in 0..200 {
            let key = format!("key{}", i);
            if node.cache.route(&key).await.owners.contains(&down) {
                affected.get_or_insert(key);
            } else {
                unaffected.get_or_insert(key);
            }
        }
        let (affected, unaffected) = (affected.unwrap(), unaffected.unwrap());

        assert!(node.put(&affected, json!(1), None).await.is_err());
        assert_eq!(node.health(), HealthStatus::QuorumLost);

        // Writes to healthy partitions do not hide the loss.
        node.put(&unaffected, json!(1), None).await.unwrap();
        assert_eq!(node.health(), HealthStatus::QuorumLost);

        node.mark_up(&down).await.unwrap();
        assert_eq!(node.health(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_membership_changes() {
        let (node, _) = node(test_config()).await;
        for i in 0..20 {
            node.put(&format!("key{}", i), json!(i), None).await.unwrap();
        }

        node.join(MemberId::new("node-2"), "127.0.0.1:3001".parse().unwrap())
            .await
            .unwrap();
        let view = node.cluster().await;
        assert_eq!(view.members.len(), 2);
        assert_eq!(view.generation, 2);

        node.leave(&MemberId::new("node-2")).await.unwrap();
        for i in 0..20 {
            assert!(node.contains(&format!("key{}", i)).await.unwrap());
        }

        assert!(matches!(
            node.leave(&MemberId::new("ghost")).await,
            Err(GridError::UnknownMember(_))
        ));
        assert!(matches!(
            node.mark_down(&MemberId::new("node-1")).await,
            Err(GridError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_keys_merge_cache_and_store() {
        let (node, store) = node(test_config()).await;
        store
            .put("stored", &Record::new("stored", json!(1), Stamp::new(1, "x"), None))
            .await
            .unwrap();
        node.put("cached", json!(2), None).await.unwrap();

        assert_eq!(node.keys().await.unwrap(), vec!["cached", "stored"]);

        node.delete("stored").await.unwrap();
        node.flush_pending().await.unwrap();
        assert_eq!(node.keys().await.unwrap(), vec!["cached"]);
    }

    #[tokio::test]
    async fn test_expired_entries_deleted_from_store() {
        let (node, store) = node(test_config()).await;
        node.put("k", json!(1), Some(0)).await.unwrap();
        node.flush_pending().await.unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        let mut events = node.subscribe();
        assert_eq!(node.cleanup_expired().await, 1);
        node.flush_pending().await.unwrap();

        assert_eq!(events.recv().await.unwrap().kind, EntryEventKind::Expired);
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(node.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_late_store_read_does_not_revive_deleted_key() {
        let (node, store) = node(test_config()).await;
        let v1 = Record::new("k", json!("old"), Stamp::new(1, "node-9"), None);
        store.put("k", &v1).await.unwrap();

        // A reader fetched v1, then stalls while the key is deleted and flushed.
        let fetched = store.get("k").await.unwrap().unwrap();
        assert!(node.delete("k").await.unwrap());
        node.flush_pending().await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        let route = node.cache.route("k").await;
        node.cache.populate(fetched, &route).await.unwrap();

        assert_eq!(node.get("k").await.unwrap(), None);
        assert!(node.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outage_keeps_flush_queue_bounded() {
        let config = Config {
            flush_max_attempts: 5,
            flush_initial_backoff_ms: 20,
            flush_max_backoff_ms: 200,
            ..test_config()
        };
        let (node, store) = node(config).await;
        store.set_available(false);

        for i in 0..20 {
            node.put(&format!("key{}", i), json!(i), None).await.unwrap();
        }
        for _ in 0..3 {
            node.sweep_dirty().await;
            assert!(node.pending_flushes() <= 20);
        }

        let started = std::time::Instant::now();
        node.flush_pending().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(node.health(), HealthStatus::Degraded);
        assert_eq!(node.pending_flushes(), 0);
        assert_eq!(node.stats().await.cache.dirty_entries, 20);

        store.set_available(true);
        assert_eq!(node.sweep_dirty().await, 20);
        node.flush_pending().await.unwrap();
        assert_eq!(node.health(), HealthStatus::Healthy);
        assert_eq!(store.len().await, 20);
    }

    #[tokio::test]
    async fn test_update_field_keeps_rest_of_document() {
        let (node, store) = node(test_config()).await;
        let first = node
            .put("user:1", json!({"name": "A", "coins": 1}), Some(3600))
            .await
            .unwrap();

        let updated = node
            .update_field("user:1", "coins", json!(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.value, json!({"name": "A", "coins": 5}));
        assert!(updated.version > first.version);
        assert_eq!(updated.expires_at, first.expires_at);

        node.flush_pending().await.unwrap();
        assert_eq!(store.get("user:1").await.unwrap(), Some(updated));

        assert_eq!(node.update_field("missing", "coins", json!(1)).await, Ok(None));
        node.put("scalar", json!(3), None).await.unwrap();
        assert!(matches!(
            node.update_field("scalar", "coins", json!(1)).await,
            Err(GridError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_maps_lists_namespaces() {
        let (node, _) = node(test_config()).await;
        node.map("users").unwrap().put("1", json!(1), None).await.unwrap();
        node.map("teams").unwrap().put("1", json!(1), None).await.unwrap();
        node.put("unscoped", json!(1), None).await.unwrap();

        assert_eq!(node.maps().await.unwrap(), vec!["teams", "users"]);
        assert!(matches!(node.map("no/slash"), Err(GridError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let (node, store) = node(test_config()).await;
        node.put("k", json!(1), None).await.unwrap();

        node.shutdown().await;
        assert!(store.get("k").await.unwrap().is_some());
        assert!(node.flush_pending().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = Config {
            write_quorum: 5,
            ..test_config()
        };
        let store = Arc::new(MemoryDocumentStore::new());
        assert!(Coordinator::start(&config, store).await.is_err());
    }
}
