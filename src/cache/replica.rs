//! Replica Module
//!
//! A member's in-memory share of the grid.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::cache::CacheStore;
use crate::cluster::MemberId;

/// The cache store hosted by one member, plus its liveness.
#[derive(Debug)]
pub struct Replica {
    member: MemberId,
    pub(crate) store: RwLock<CacheStore>,
    online: AtomicBool,
}

impl Replica {
    pub fn new(member: MemberId, max_entries: usize) -> Self {
        Self {
            member,
            store: RwLock::new(CacheStore::new(max_entries)),
            online: AtomicBool::new(true),
        }
    }

    pub fn member(&self) -> &MemberId {
        &self.member
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Takes the replica down and drops its memory, as a crash would.
    pub async fn crash(&self) {
        self.online.store(false, Ordering::SeqCst);
        self.store.write().await.clear();
    }

    /// Brings the replica back, empty until resynchronised.
    pub fn restart(&self) {
        self.online.store(true, Ordering::SeqCst);
    }
}
