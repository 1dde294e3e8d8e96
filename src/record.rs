//! Record Module
//!
//! The unit of data stored in the grid and persisted to the document store.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GridError, Result};

// == Public Constants ==
/// Maximum allowed key length in bytes, within one map
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed map name length in bytes
pub const MAX_MAP_NAME_LENGTH: usize = 64;

/// Maximum length of a grid key, `map/key`
pub const MAX_GRID_KEY_LENGTH: usize = MAX_MAP_NAME_LENGTH + 1 + MAX_KEY_LENGTH;

/// Map used by the un-namespaced endpoints
pub const DEFAULT_MAP: &str = "default";

const MAP_SEPARATOR: char = '/';

/// Maximum allowed encoded value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

// == Stamp ==
/// Version stamp used for last-writer-wins resolution.
///
/// Ordering is by `version` first, then by `origin` so that two members
/// writing in the same millisecond still agree on a single winner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub version: u64,
    pub origin: String,
}

impl Stamp {
    pub fn new(version: u64, origin: impl Into<String>) -> Self {
        Self {
            version,
            origin: origin.into(),
        }
    }
}

// == Record ==
/// A keyed document with its version stamp and optional expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique record key
    pub key: String,
    /// Opaque structured document
    pub value: Value,
    /// Hybrid timestamp (Unix milliseconds) assigned by the writing member
    pub version: u64,
    /// Id of the member that produced this version
    pub origin: String,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Record {
    // == Constructor ==
    /// Creates a record stamped with `stamp`, expiring `ttl_seconds` from now.
    pub fn new(key: impl Into<String>, value: Value, stamp: Stamp, ttl_seconds: Option<u64>) -> Self {
        let expires_at =
            ttl_seconds.map(|ttl| current_timestamp_ms().saturating_add(ttl.saturating_mul(1000)));
        Self {
            key: key.into(),
            value,
            version: stamp.version,
            origin: stamp.origin,
            expires_at,
        }
    }

    /// Returns this record's version stamp.
    pub fn stamp(&self) -> Stamp {
        Stamp::new(self.version, self.origin.clone())
    }

    /// True if this record wins over a competing `other` stamp.
    pub fn supersedes(&self, other: &Stamp) -> bool {
        (self.version, self.origin.as_str()) > (other.version, other.origin.as_str())
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => current_timestamp_ms() >= expires,
            None => false,
        }
    }

    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()) / 1000)
    }
}

// == Validation ==
/// Rejects empty and oversized keys.
pub fn validate_key(key: &str) -> Result<()> {
    check_key(key, MAX_KEY_LENGTH)
}

/// Rejects empty grid keys and grid keys longer than any `map/key` can be.
pub fn validate_grid_key(key: &str) -> Result<()> {
    check_key(key, MAX_GRID_KEY_LENGTH)
}

fn check_key(key: &str, max_len: usize) -> Result<()> {
    if key.is_empty() {
        return Err(GridError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > max_len {
        return Err(GridError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            max_len
        )));
    }
    Ok(())
}

/// Map names are 1 to 64 ASCII letters, digits, `-`, `_` or `.`.
pub fn validate_map_name(map: &str) -> Result<()> {
    if map.is_empty() || map.len() > MAX_MAP_NAME_LENGTH {
        return Err(GridError::InvalidRequest(format!(
            "Map name must be 1 to {} bytes",
            MAX_MAP_NAME_LENGTH
        )));
    }
    if !map
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(GridError::InvalidRequest(format!(
            "Invalid map name: {}",
            map
        )));
    }
    Ok(())
}

// == Map Scoping ==
/// Builds the grid key of `key` inside `map`.
pub fn scoped_key(map: &str, key: &str) -> Result<String> {
    validate_map_name(map)?;
    validate_key(key)?;
    Ok(format!("{}{}{}", map, MAP_SEPARATOR, key))
}

/// Splits a grid key into its map and key. None for keys outside any map.
pub fn split_scoped_key(grid_key: &str) -> Option<(&str, &str)> {
    let (map, key) = grid_key.split_once(MAP_SEPARATOR)?;
    (validate_map_name(map).is_ok() && !key.is_empty()).then_some((map, key))
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
