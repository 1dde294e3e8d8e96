//! Entry Events
//!
//! Notifications published when records enter, change in, or leave the grid.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryEventKind {
    Added,
    Updated,
    Removed,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryEvent {
    pub kind: EntryEventKind,
    pub key: String,
    pub version: u64,
}

impl EntryEvent {
    pub fn new(kind: EntryEventKind, key: impl Into<String>, version: u64) -> Self {
        Self {
            kind,
            key: key.into(),
            version,
        }
    }
}
