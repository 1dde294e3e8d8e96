//! Partition Module
//!
//! Key hashing and the partition-to-owner table.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use super::member::MemberId;

/// Maps a key to its partition. Independent of membership.
pub fn partition_for(key: &str, partition_count: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % u64::from(partition_count)) as u32
}

/// Where an operation on a key has to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub partition: u32,
    /// Primary first, then backups
    pub owners: Vec<MemberId>,
}

impl Route {
    pub fn primary(&self) -> Option<&MemberId> {
        self.owners.first()
    }
}

/// Partition-to-owner assignment for one membership generation.
///
/// Owners of partition `p` are the `replication_factor` members following
/// position `p` in the sorted member list, so every member appears at most
/// once per partition.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    partition_count: u32,
    replication_factor: usize,
    generation: u64,
    assignments: Vec<Vec<MemberId>>,
}

impl PartitionTable {
    pub fn build(
        members: &[MemberId],
        partition_count: u32,
        replication_factor: usize,
        generation: u64,
    ) -> Self {
        let mut sorted = members.to_vec();
        sorted.sort();
        sorted.dedup();

        let replicas = replication_factor.min(sorted.len());
        let assignments = (0..partition_count)
            .map(|partition| {
                (0..replicas)
                    .map(|i| sorted[(partition as usize + i) % sorted.len()].clone())
                    .collect()
            })
            .collect();

        Self {
            partition_count,
            replication_factor,
            generation,
            assignments,
        }
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn owners(&self, partition: u32) -> &[MemberId] {
        self.assignments
            .get(partition as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn route(&self, key: &str) -> Route {
        let partition = partition_for(key, self.partition_count);
        Route {
            partition,
            owners: self.owners(partition).to_vec(),
        }
    }

    /// Partitions whose owner list differs from `previous`.
    pub fn changed_since(&self, previous: &PartitionTable) -> Vec<u32> {
        (0..self.partition_count)
            .filter(|&p| self.owners(p) != previous.owners(p))
            .collect()
    }

    /// Partitions listing `member` anywhere in their owner list.
    pub fn partitions_of(&self, member: &MemberId) -> Vec<u32> {
        (0..self.partition_count)
            .filter(|&p| self.owners(p).contains(member))
            .collect()
    }

    pub fn ownership(&self, member: &MemberId) -> Ownership {
        let mut ownership = Ownership::default();
        for owners in &self.assignments {
            match owners.iter().position(|m| m == member) {
                Some(0) => ownership.primary += 1,
                Some(_) => ownership.backup += 1,
                None => {}
            }
        }
        ownership
    }
}

/// Number of partitions a member holds as primary and as backup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ownership {
    pub primary: u32,
    pub backup: u32,
}
