//! Cluster Module
//!
//! Membership, partition assignment and version clocks.
//!
//! The partition table is rebuilt only by membership events and read by
//! every routed operation.

mod clock;
mod member;
mod membership;
mod partition;

pub use clock::HybridClock;
pub use member::{ClusterMember, MemberId, MemberState};
pub use membership::{Membership, MembershipWriter, TableChange};
pub use partition::{partition_for, Ownership, PartitionTable, Route};
