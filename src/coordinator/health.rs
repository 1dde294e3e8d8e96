//! Health Module
//!
//! Degraded and quorum-lost signals plus write-through counters.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{error, info, warn};

/// Overall node condition reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// The store failed past the retry budget; writes are held in memory
    Degraded,
    /// At least one partition cannot reach its write quorum
    QuorumLost,
}

/// Write-through counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlushStats {
    pub flushed: u64,
    pub failed: u64,
    pub conflicts: u64,
    pub consecutive_store_failures: u32,
}

/// Shared health signals for one node.
#[derive(Debug, Default)]
pub struct HealthState {
    degraded: AtomicBool,
    quorum_lost: AtomicBool,
    /// Partitions whose last write missed quorum
    lost_partitions: Mutex<BTreeSet<u32>>,
    consecutive_store_failures: AtomicU32,
    flushed: AtomicU64,
    failed: AtomicU64,
    conflicts: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> HealthStatus {
        if self.quorum_lost.load(Ordering::SeqCst) {
            HealthStatus::QuorumLost
        } else if self.degraded.load(Ordering::SeqCst) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// A store call succeeded; clears the degraded signal.
    pub fn record_store_success(&self) {
        self.consecutive_store_failures.store(0, Ordering::SeqCst);
        if self.degraded.swap(false, Ordering::SeqCst) {
            info!("Persistent store recovered, leaving degraded mode");
        }
    }

    /// A store call exhausted its retries.
    pub fn record_store_failure(&self) {
        let failures = self.consecutive_store_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(
                "Persistent store unavailable after retries ({} consecutive), entering degraded mode",
                failures
            );
        }
    }

    pub fn record_flushed(&self) {
        self.flushed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_flush_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::SeqCst);
    }

    /// Records whether a write to `partition` reached its quorum.
    ///
    /// The node reports quorum loss while any partition is lost; a success
    /// only clears its own partition.
    pub fn record_quorum(&self, partition: u32, reached: bool) {
        let mut lost = self
            .lost_partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if reached {
            if lost.remove(&partition) {
                info!(
                    "Write quorum restored for partition {} ({} still lost)",
                    partition,
                    lost.len()
                );
            }
        } else if lost.insert(partition) {
            error!(
                "Write quorum lost for partition {} ({} lost)",
                partition,
                lost.len()
            );
        }
        self.quorum_lost.store(!lost.is_empty(), Ordering::SeqCst);
    }

    pub fn lost_partitions(&self) -> Vec<u32> {
        self.lost_partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    pub fn flush_stats(&self) -> FlushStats {
        FlushStats {
            flushed: self.flushed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            conflicts: self.conflicts.load(Ordering::SeqCst),
            consecutive_store_failures: self.consecutive_store_failures.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_healthy() {
        assert_eq!(HealthState::new().status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_store_failure_degrades_until_success() {
        let health = HealthState::new();
        health.record_store_failure();
        health.record_store_failure();

        assert_eq!(health.status(), HealthStatus::Degraded);
        assert_eq!(health.flush_stats().consecutive_store_failures, 2);

        health.record_store_success();
        assert_eq!(health.status(), HealthStatus::Healthy);
        assert_eq!(health.flush_stats().consecutive_store_failures, 0);
    }

    #[test]
    fn test_quorum_loss_takes_precedence() {
        let health = HealthState::new();
        health.record_store_failure();
        health.record_quorum(3, false);
        assert_eq!(health.status(), HealthStatus::QuorumLost);

        health.record_quorum(3, true);
        assert_eq!(health.status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_success_elsewhere_keeps_quorum_lost() {
        let health = HealthState::new();
        health.record_quorum(1, false);
        health.record_quorum(2, false);

        health.record_quorum(7, true);
        assert_eq!(health.status(), HealthStatus::QuorumLost);

        health.record_quorum(1, true);
        assert_eq!(health.status(), HealthStatus::QuorumLost);
        assert_eq!(health.lost_partitions(), vec![2]);

        health.record_quorum(2, true);
        assert_eq!(health.status(), HealthStatus::Healthy);
    }
}
