//! Background Tasks Module
//!
//! Contains background tasks that run periodically during node operation.
//!
//! # Tasks
//! - TTL Cleanup: Retires expired cache entries at configured intervals
//! - Sweep: Re-queues entries the write-through could not persist
//! - Event logger: Logs entry events as they happen

mod cleanup;
mod events;
mod sweep;

pub use cleanup::spawn_cleanup_task;
pub use events::spawn_event_logger;
pub use sweep::spawn_sweep_task;
