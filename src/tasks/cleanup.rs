//! TTL Cleanup Task
//!
//! Background task that periodically retires expired cache entries and
//! queues their deletion from the persistent store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::coordinator::Coordinator;

/// Spawns a background task that periodically cleans up expired cache entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between cleanup runs. Expired records become tombstones on every replica
/// and are flushed like any other delete.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_cleanup_task(
    coordinator: Arc<Coordinator>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let expired = coordinator.cleanup_expired().await;
            if expired > 0 {
                info!("TTL cleanup: retired {} expired entries", expired);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
