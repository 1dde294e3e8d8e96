//! Cache Module
//!
//! Partitioned, replicated in-memory caching with TTL expiration, LRU
//! eviction and per-entry write-through state.

mod distributed;
mod entry;
mod events;
mod lru;
mod replica;
mod stats;
mod store;


// Re-export public types
pub use distributed::{DistributedCache, ReplicaSummary};
pub use entry::{CacheEntry, Slot};
pub use events::{EntryEvent, EntryEventKind};
pub use lru::LruTracker;
pub use replica::Replica;
pub use stats::CacheStats;
pub use store::{CacheRead, CacheStore, WriteOutcome};
