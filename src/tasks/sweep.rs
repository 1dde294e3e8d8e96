//! Dirty Entry Sweep Task
//!
//! Re-queues entries whose write-through failed so they reach the store
//! once it recovers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::Coordinator;

/// Spawns a background task that periodically re-queues dirty entries.
pub fn spawn_sweep_task(coordinator: Arc<Coordinator>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting write-through sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let queued = coordinator.sweep_dirty().await;
            if queued > 0 {
                info!(
                    "Sweep: re-queued {} dirty entries (store degraded: {})",
                    queued,
                    coordinator.is_degraded()
                );
            } else {
                debug!("Sweep: nothing pending");
            }
        }
    })
}
