//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with write-through state.

use std::cmp::Ordering;

use crate::record::{Record, Stamp};

// == Slot ==
/// What a cache entry currently holds for its key.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// A live record
    Live(Record),
    /// A delete marker; kept for a grace period after it reaches the store
    Tombstone(Stamp),
}

// == Cache Entry ==
/// A record or tombstone plus its write-through state.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub slot: Slot,
    /// True until the persistent store has acknowledged this version
    pub dirty: bool,
}

impl CacheEntry {
    // == Constructors ==
    /// Entry produced by a local write, pending flush.
    pub fn dirty(record: Record) -> Self {
        Self {
            slot: Slot::Live(record),
            dirty: true,
        }
    }

    /// Entry loaded from the persistent store.
    pub fn clean(record: Record) -> Self {
        Self {
            slot: Slot::Live(record),
            dirty: false,
        }
    }

    /// Pending delete.
    pub fn tombstone(stamp: Stamp) -> Self {
        Self {
            slot: Slot::Tombstone(stamp),
            dirty: true,
        }
    }

    pub fn stamp(&self) -> Stamp {
        match &self.slot {
            Slot::Live(record) => record.stamp(),
            Slot::Tombstone(stamp) => stamp.clone(),
        }
    }

    pub fn record(&self) -> Option<&Record> {
        match &self.slot {
            Slot::Live(record) => Some(record),
            Slot::Tombstone(_) => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.slot, Slot::Tombstone(_))
    }

    // == Is Expired ==
    /// Tombstones never expire.
    pub fn is_expired(&self) -> bool {
        self.record().map(Record::is_expired).unwrap_or(false)
    }

    /// Last-writer-wins ordering between two entries for the same key.
    ///
    /// Stamps decide; on equal stamps a tombstone beats the live record it
    /// replaces, which is how TTL expiry retires a record.
    pub fn precedence(&self, other: &CacheEntry) -> Ordering {
        self.stamp()
            .cmp(&other.stamp())
            .then(self.is_tombstone().cmp(&other.is_tombstone()))
    }

    /// Turns an expired record into a tombstone carrying the same stamp.
    pub fn expire(&mut self) {
        if let Slot::Live(record) = &self.slot {
            self.slot = Slot::Tombstone(record.stamp());
            self.dirty = true;
        }
    }
}
