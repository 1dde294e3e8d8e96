//! Membership Module
//!
//! The member set and its partition table. Changes go through a single
//! writer so tables are rebuilt one generation at a time.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;

use super::member::{ClusterMember, MemberId, MemberState};
use super::partition::{PartitionTable, Route};
use crate::error::{GridError, Result};

/// Partition table before and after a membership change.
#[derive(Debug, Clone)]
pub struct TableChange {
    pub previous: Arc<PartitionTable>,
    pub current: Arc<PartitionTable>,
}

impl TableChange {
    pub fn changed_partitions(&self) -> Vec<u32> {
        self.current.changed_since(&self.previous)
    }
}

/// Cluster membership and the partition table derived from it.
///
/// Routing takes the table under a read lock. All mutations go through a
/// [`MembershipWriter`], of which at most one exists at a time.
#[derive(Debug)]
pub struct Membership {
    local: MemberId,
    partition_count: u32,
    replication_factor: usize,
    members: RwLock<BTreeMap<MemberId, ClusterMember>>,
    table: RwLock<Arc<PartitionTable>>,
    writer: Mutex<()>,
}

impl Membership {
    /// Starts a single-member cluster made of `local`.
    pub fn new(local: ClusterMember, partition_count: u32, replication_factor: usize) -> Self {
        let local_id = local.id.clone();
        let table = PartitionTable::build(
            std::slice::from_ref(&local_id),
            partition_count,
            replication_factor,
            1,
        );
        let mut members = BTreeMap::new();
        members.insert(local_id.clone(), local);

        Self {
            local: local_id,
            partition_count,
            replication_factor,
            members: RwLock::new(members),
            table: RwLock::new(Arc::new(table)),
            writer: Mutex::new(()),
        }
    }

    pub fn local_id(&self) -> &MemberId {
        &self.local
    }

    pub async fn table(&self) -> Arc<PartitionTable> {
        self.table.read().await.clone()
    }

    pub async fn route(&self, key: &str) -> Route {
        self.table.read().await.route(key)
    }

    pub async fn members(&self) -> Vec<ClusterMember> {
        self.members.read().await.values().cloned().collect()
    }

    pub async fn member(&self, id: &MemberId) -> Option<ClusterMember> {
        self.members.read().await.get(id).cloned()
    }

    /// Waits for exclusive write access to the membership.
    pub async fn writer(&self) -> MembershipWriter<'_> {
        MembershipWriter {
            membership: self,
            _guard: self.writer.lock().await,
        }
    }

    async fn rebuild(&self) -> TableChange {
        let ids: Vec<MemberId> = self.members.read().await.keys().cloned().collect();
        let mut table = self.table.write().await;
        let previous = table.clone();
        let current = Arc::new(PartitionTable::build(
            &ids,
            self.partition_count,
            self.replication_factor,
            previous.generation() + 1,
        ));
        *table = current.clone();
        TableChange { previous, current }
    }
}

/// Exclusive handle for membership changes.
///
/// Holding it keeps other membership events out, so callers can finish
/// migrating data for one change before the next begins.
pub struct MembershipWriter<'a> {
    membership: &'a Membership,
    _guard: MutexGuard<'a, ()>,
}

impl MembershipWriter<'_> {
    pub async fn join(&mut self, member: ClusterMember) -> Result<TableChange> {
        {
            let mut members = self.membership.members.write().await;
            if members.contains_key(&member.id) {
                return Err(GridError::InvalidRequest(format!(
                    "Member {} is already part of the cluster",
                    member.id
                )));
            }
            info!("Member {} joining from {}", member.id, member.address);
            members.insert(member.id.clone(), member);
        }
        Ok(self.membership.rebuild().await)
    }

    pub async fn leave(&mut self, id: &MemberId) -> Result<TableChange> {
        if id == &self.membership.local {
            return Err(GridError::InvalidRequest(
                "The local member cannot leave its own cluster".to_string(),
            ));
        }
        {
            let mut members = self.membership.members.write().await;
            if members.remove(id).is_none() {
                return Err(GridError::UnknownMember(id.to_string()));
            }
            info!("Member {} left the cluster", id);
        }
        Ok(self.membership.rebuild().await)
    }

    /// Changes a member's liveness without touching partition ownership.
    pub async fn set_state(&mut self, id: &MemberId, state: MemberState) -> Result<ClusterMember> {
        let mut members = self.membership.members.write().await;
        let member = members
            .get_mut(id)
            .ok_or_else(|| GridError::UnknownMember(id.to_string()))?;
        member.state = state;
        info!("Member {} is now {:?}", id, state);
        Ok(member.clone())
    }
}
