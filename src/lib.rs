//! Gridcache - a partitioned, replicated in-memory cache
//!
//! Keys are spread over partitions owned by cluster members and replicated
//! to a write quorum. Writes go to the cache first and reach a persistent
//! document store through an asynchronous write-through.

pub mod api;
pub mod cache;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod record;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use coordinator::Coordinator;
pub use error::{GridError, Result};
pub use record::Record;
pub use tasks::{spawn_cleanup_task, spawn_sweep_task};
