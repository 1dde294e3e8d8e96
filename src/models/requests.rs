//! Request DTOs for the node API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::net::SocketAddr;

use serde::Deserialize;
use serde_json::Value;

use crate::record::MAX_KEY_LENGTH;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON document
/// - `ttl`: Optional TTL in seconds (uses default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        None
    }
}

/// Request body for PATCH /update/:key
///
/// Sets one top-level field of a stored JSON object.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    pub field: String,
    pub value: Value,
}

impl UpdateRequest {
    pub fn validate(&self) -> Option<String> {
        if self.field.is_empty() {
            return Some("Field cannot be empty".to_string());
        }
        None
    }
}

/// Request body for POST /cluster/members
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub id: String,
    pub address: SocketAddr,
}

impl JoinRequest {
    pub fn validate(&self) -> Option<String> {
        if self.id.trim().is_empty() {
            return Some("Member id cannot be empty".to_string());
        }
        None
    }
}
