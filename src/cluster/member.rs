//! Cluster Member Module
//!
//! Member identity, address and liveness state.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::record::current_timestamp_ms;

/// Stable identifier of a cluster member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberState {
    Alive,
    Down,
}

/// A node of the grid. Members only carry routing responsibility; records
/// belong to partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMember {
    pub id: MemberId,
    pub address: SocketAddr,
    /// Unix milliseconds at which the member joined
    pub joined_at: u64,
    pub state: MemberState,
}

impl ClusterMember {
    pub fn new(id: MemberId, address: SocketAddr) -> Self {
        Self {
            id,
            address,
            joined_at: current_timestamp_ms(),
            state: MemberState::Alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state == MemberState::Alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_is_alive() {
        let member = ClusterMember::new(MemberId::new("node-1"), "127.0.0.1:5701".parse().unwrap());
        assert!(member.is_alive());
        assert!(member.joined_at > 0);
        assert_eq!(member.id.to_string(), "node-1");
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&MemberState::Down).unwrap();
        assert_eq!(json, "\"down\"");
    }
}
