//! Entry Event Logger
//!
//! Follows the cache's entry events and logs them.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::EntryEventKind;
use crate::coordinator::Coordinator;

/// Spawns a listener that logs every added, updated, removed and expired entry.
///
/// The task ends when the event channel closes.
pub fn spawn_event_logger(coordinator: Arc<Coordinator>) -> JoinHandle<()> {
    let mut events = coordinator.subscribe();
    drop(coordinator);

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event.kind {
                    EntryEventKind::Added => {
                        debug!("Entry added: {} (version {})", event.key, event.version)
                    }
                    EntryEventKind::Updated => {
                        debug!("Entry updated: {} (version {})", event.key, event.version)
                    }
                    EntryEventKind::Removed => {
                        debug!("Entry removed: {} (version {})", event.key, event.version)
                    }
                    EntryEventKind::Expired => {
                        debug!("Entry expired: {} (version {})", event.key, event.version)
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event logger fell behind, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_event_logger_keeps_running() {
        let config = Config {
            partition_count: 8,
            ..Config::default()
        };
        let coordinator = Coordinator::start(&config, Arc::new(MemoryDocumentStore::new()))
            .await
            .unwrap();

        let handle = spawn_event_logger(coordinator.clone());
        coordinator.put("k", json!(1), None).await.unwrap();
        coordinator.delete("k").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
