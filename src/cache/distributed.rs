//! Distributed Cache Module
//!
//! The partitioned, replicated map. Every key routes to one partition whose
//! owners each hold a copy; writes must be acknowledged by a quorum of
//! them before they return.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{
    CacheEntry, CacheRead, CacheStats, EntryEvent, EntryEventKind, Replica, WriteOutcome,
};
use crate::cluster::{partition_for, MemberId, Membership, Route, TableChange};
use crate::error::{GridError, Result};
use crate::record::{Record, Stamp};

const EVENT_CAPACITY: usize = 1024;

/// Per-member view used by the cluster endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaSummary {
    pub member: MemberId,
    pub online: bool,
    pub stats: CacheStats,
}

/// Replicated in-memory map spread over the cluster's members.
pub struct DistributedCache {
    membership: Arc<Membership>,
    replicas: RwLock<HashMap<MemberId, Arc<Replica>>>,
    max_entries: usize,
    write_quorum: usize,
    events: broadcast::Sender<EntryEvent>,
}

impl DistributedCache {
    /// Creates the cache with a replica for every current member.
    pub async fn new(membership: Arc<Membership>, max_entries: usize, write_quorum: usize) -> Self {
        let mut replicas = HashMap::new();
        for member in membership.members().await {
            replicas.insert(
                member.id.clone(),
                Arc::new(Replica::new(member.id, max_entries)),
            );
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            membership,
            replicas: RwLock::new(replicas),
            max_entries,
            write_quorum,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntryEvent> {
        self.events.subscribe()
    }

    pub async fn route(&self, key: &str) -> Route {
        self.membership.route(key).await
    }

    async fn online_owners(&self, route: &Route) -> Vec<Arc<Replica>> {
        let replicas = self.replicas.read().await;
        route
            .owners
            .iter()
            .filter_map(|id| replicas.get(id))
            .filter(|replica| replica.is_online())
            .cloned()
            .collect()
    }

    fn required_acks(quorum: usize, route: &Route) -> usize {
        quorum.min(route.owners.len()).max(1)
    }

    /// True if enough owners of `partition` are online to take a write.
    pub async fn partition_has_quorum(&self, partition: u32) -> bool {
        let table = self.membership.table().await;
        let route = Route {
            partition,
            owners: table.owners(partition).to_vec(),
        };
        let online = self.online_owners(&route).await.len();
        online >= Self::required_acks(self.write_quorum, &route)
    }

    async fn online_replicas(&self) -> Vec<Arc<Replica>> {
        self.replicas
            .read()
            .await
            .values()
            .filter(|replica| replica.is_online())
            .cloned()
            .collect()
    }

    fn publish(&self, kind: EntryEventKind, key: &str, version: u64) {
        // No subscribers is fine.
        let _ = self.events.send(EntryEvent::new(kind, key, version));
    }

    // == Read ==
    pub async fn read(&self, key: &str) -> Result<CacheRead> {
        let route = self.route(key).await;
        self.read_routed(key, &route).await
    }

    /// Reads from the first online owner, primary first.
    pub async fn read_routed(&self, key: &str, route: &Route) -> Result<CacheRead> {
        let owners = self.online_owners(route).await;
        let replica = owners.first().ok_or(GridError::QuorumLost {
            partition: route.partition,
            acks: 0,
            required: 1,
        })?;
        let result = replica.store.write().await.read(key);
        debug!(
            "Read {} from {} (partition {}): {:?}",
            key,
            replica.member(),
            route.partition,
            matches!(result, CacheRead::Hit(_))
        );
        Ok(result)
    }

    /// Returns the entry held by the first online owner, without stats.
    pub async fn peek(&self, key: &str) -> Option<CacheEntry> {
        let route = self.route(key).await;
        let owners = self.online_owners(&route).await;
        let replica = owners.first()?;
        let store = replica.store.read().await;
        store.peek(key).cloned()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.peek(key)
            .await
            .map(|entry| !entry.is_tombstone() && !entry.is_expired())
            .unwrap_or(false)
    }

    // == Write ==
    /// Writes a dirty record to a quorum of its owners.
    pub async fn write(&self, record: Record) -> Result<WriteOutcome> {
        let route = self.route(&record.key).await;
        self.write_routed(record, &route).await
    }

    pub async fn write_routed(&self, record: Record, route: &Route) -> Result<WriteOutcome> {
        let key = record.key.clone();
        let version = record.version;
        let outcome = self
            .replicate(&key, route, CacheEntry::dirty(record), self.write_quorum)
            .await?;

        match outcome {
            WriteOutcome::Inserted => self.publish(EntryEventKind::Added, &key, version),
            WriteOutcome::Updated => self.publish(EntryEventKind::Updated, &key, version),
            WriteOutcome::Unchanged | WriteOutcome::Superseded => {}
        }
        Ok(outcome)
    }

    /// Writes a dirty delete marker to a quorum of the key's owners.
    pub async fn tombstone(&self, key: &str, stamp: Stamp) -> Result<WriteOutcome> {
        let route = self.route(key).await;
        let version = stamp.version;
        let outcome = self
            .replicate(key, &route, CacheEntry::tombstone(stamp), self.write_quorum)
            .await?;

        if matches!(outcome, WriteOutcome::Inserted | WriteOutcome::Updated) {
            self.publish(EntryEventKind::Removed, key, version);
        }
        Ok(outcome)
    }

    /// Installs a record fetched from the persistent store.
    pub async fn populate(&self, record: Record, route: &Route) -> Result<WriteOutcome> {
        let key = record.key.clone();
        self.replicate(&key, route, CacheEntry::clean(record), 1).await
    }

    async fn replicate(
        &self,
        key: &str,
        route: &Route,
        entry: CacheEntry,
        quorum: usize,
    ) -> Result<WriteOutcome> {
        let required = Self::required_acks(quorum, route);
        let mut acks = 0;
        let mut outcome = None;
        let mut last_error = None;

        for replica in self.online_owners(route).await {
            match replica.store.write().await.apply(key, entry.clone()) {
                Ok(applied) => {
                    acks += 1;
                    outcome.get_or_insert(applied);
                }
                Err(e) => {
                    warn!("Replica {} rejected {}: {}", replica.member(), key, e);
                    last_error = Some(e);
                }
            }
        }

        if acks < required {
            return Err(match last_error {
                Some(e @ GridError::CacheFull(_)) => e,
                _ => GridError::QuorumLost {
                    partition: route.partition,
                    acks,
                    required,
                },
            });
        }
        Ok(outcome.unwrap_or(WriteOutcome::Superseded))
    }

    // == Invalidate ==
    /// Drops the cached copy of `key` from its owners. The store is untouched.
    pub async fn invalidate(&self, key: &str) {
        let route = self.route(key).await;
        for replica in self.online_owners(&route).await {
            replica.store.write().await.remove(key);
        }
    }

    // == Write-through bookkeeping ==
    /// Marks `stamp` as persisted on every online owner.
    pub async fn mark_clean(&self, key: &str, stamp: &Stamp) -> bool {
        let route = self.route(key).await;
        let mut any = false;
        for replica in self.online_owners(&route).await {
            any |= replica.store.write().await.mark_clean(key, stamp);
        }
        any
    }

    pub async fn dirty_keys(&self) -> Vec<String> {
        let mut keys = BTreeSet::new();
        for replica in self.online_replicas().await {
            keys.extend(replica.store.read().await.dirty_keys());
        }
        keys.into_iter().collect()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys = BTreeSet::new();
        for replica in self.online_replicas().await {
            keys.extend(replica.store.read().await.keys());
        }
        keys.into_iter().collect()
    }

    // == Cleanup Expired ==
    /// Retires expired records on every replica and returns the keys.
    pub async fn cleanup_expired(&self) -> Vec<String> {
        let mut expired = BTreeSet::new();
        for replica in self.online_replicas().await {
            expired.extend(replica.store.write().await.cleanup_expired());
        }
        for key in &expired {
            if let Some(entry) = self.peek(key).await {
                self.publish(EntryEventKind::Expired, key, entry.stamp().version);
            }
        }
        expired.into_iter().collect()
    }

    // == Stats ==
    /// Stats summed over all online replicas.
    pub async fn stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for replica in self.online_replicas().await {
            total += &replica.store.read().await.stats();
        }
        total
    }

    pub async fn replica_summaries(&self) -> Vec<ReplicaSummary> {
        let replicas: Vec<Arc<Replica>> = self.replicas.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(replicas.len());
        for replica in replicas {
            summaries.push(ReplicaSummary {
                member: replica.member().clone(),
                online: replica.is_online(),
                stats: replica.store.read().await.stats(),
            });
        }
        summaries.sort_by(|a, b| a.member.cmp(&b.member));
        summaries
    }

    // == Membership Hooks ==
    pub async fn add_replica(&self, member: &MemberId) {
        self.replicas
            .write()
            .await
            .entry(member.clone())
            .or_insert_with(|| Arc::new(Replica::new(member.clone(), self.max_entries)));
    }

    pub async fn remove_replica(&self, member: &MemberId) {
        self.replicas.write().await.remove(member);
    }

    /// Moves partition data to match a new partition table.
    ///
    /// Entries are merged from every online old and new owner, copied onto
    /// the new owners, then dropped from members that no longer own them.
    pub async fn rebalance(&self, change: &TableChange) -> usize {
        let count = change.current.partition_count();
        let replicas = self.replicas.read().await.clone();
        let lookup = |ids: &[MemberId]| -> Vec<Arc<Replica>> {
            ids.iter()
                .filter_map(|id| replicas.get(id))
                .filter(|r| r.is_online())
                .cloned()
                .collect()
        };

        let mut moved = 0;
        for partition in change.changed_partitions() {
            let old_owners = change.previous.owners(partition);
            let new_owners = change.current.owners(partition);

            let mut sources = lookup(old_owners);
            sources.extend(lookup(new_owners));
            moved += copy_partition(partition, count, &sources, &lookup(new_owners)).await;

            for gone in old_owners.iter().filter(|id| !new_owners.contains(id)) {
                if let Some(replica) = replicas.get(gone) {
                    replica
                        .store
                        .write()
                        .await
                        .retain_keys(|key| partition_for(key, count) != partition);
                }
            }
        }

        info!(
            "Rebalanced to table generation {}: {} entries copied",
            change.current.generation(),
            moved
        );
        moved
    }

    /// Simulates a member crash: it stops answering and loses its memory.
    pub async fn take_offline(&self, member: &MemberId) -> Result<()> {
        let replica = self
            .replicas
            .read()
            .await
            .get(member)
            .cloned()
            .ok_or_else(|| GridError::UnknownMember(member.to_string()))?;
        replica.crash().await;
        warn!("Replica {} went offline", member);
        Ok(())
    }

    /// Restarts a member and refills it from the surviving owners.
    pub async fn bring_online(&self, member: &MemberId) -> Result<usize> {
        let replicas = self.replicas.read().await.clone();
        let target = replicas
            .get(member)
            .cloned()
            .ok_or_else(|| GridError::UnknownMember(member.to_string()))?;
        target.restart();

        let table = self.membership.table().await;
        let count = table.partition_count();
        let mut copied = 0;
        for partition in table.partitions_of(member) {
            let sources: Vec<Arc<Replica>> = table
                .owners(partition)
                .iter()
                .filter(|id| *id != member)
                .filter_map(|id| replicas.get(id))
                .filter(|r| r.is_online())
                .cloned()
                .collect();
            copied += copy_partition(partition, count, &sources, std::slice::from_ref(&target)).await;
        }

        info!("Replica {} back online, {} entries resynchronised", member, copied);
        Ok(copied)
    }
}

/// Copies the newest entry per key of `partition` from `sources` to `targets`.
async fn copy_partition(
    partition: u32,
    count: u32,
    sources: &[Arc<Replica>],
    targets: &[Arc<Replica>],
) -> usize {
    let mut merged: HashMap<String, CacheEntry> = HashMap::new();
    for source in sources {
        let entries = source
            .store
            .read()
            .await
            .entries_where(|key| partition_for(key, count) == partition);
        for (key, entry) in entries {
            match merged.get(&key) {
                Some(current) if current.precedence(&entry).is_ge() => {}
                _ => {
                    merged.insert(key, entry);
                }
            }
        }
    }

    let mut copied = 0;
    for target in targets {
        let mut store = target.store.write().await;
        for (key, entry) in &merged {
            match store.apply(key, entry.clone()) {
                Ok(WriteOutcome::Inserted | WriteOutcome::Updated) => copied += 1,
                Ok(_) => {}
                Err(e) => warn!("Could not copy {} to {}: {}", key, target.member(), e),
            }
        }
    }
    copied
}
