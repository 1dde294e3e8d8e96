//! Response DTOs for the node API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::coordinator::{FlushStats, HealthStatus};
use crate::record::Record;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
    pub version: u64,
    /// Seconds until expiry, absent when the entry never expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl From<Record> for GetResponse {
    fn from(record: Record) -> Self {
        let ttl = record.ttl_remaining();
        Self {
            key: record.key,
            value: record.value,
            version: record.version,
            ttl,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// Version assigned to the write
    pub version: u64,
    /// True while the store is unreachable and writes are held in memory
    pub degraded: bool,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, version: u64, degraded: bool) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            version,
            degraded,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /keys
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<String>,
}

impl KeysResponse {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for GET /maps
#[derive(Debug, Clone, Serialize)]
pub struct MapsResponse {
    pub count: usize,
    pub maps: Vec<String>,
}

impl MapsResponse {
    pub fn new(maps: Vec<String>) -> Self {
        Self {
            count: maps.len(),
            maps,
        }
    }
}

/// Response body for GET /maps/:map/entries
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub map: String,
    pub count: usize,
    pub entries: Vec<GetResponse>,
}

impl EntriesResponse {
    pub fn new(map: impl Into<String>, records: Vec<Record>) -> Self {
        let entries: Vec<GetResponse> = records.into_iter().map(GetResponse::from).collect();
        Self {
            map: map.into(),
            count: entries.len(),
            entries,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    pub expirations: u64,
    /// Current number of entries across online replicas
    pub total_entries: usize,
    /// Entries not yet written through
    pub dirty_entries: usize,
    pub tombstones: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub flush: FlushStats,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache and flush statistics
    pub fn new(cache: &CacheStats, flush: FlushStats) -> Self {
        Self {
            hits: cache.hits,
            misses: cache.misses,
            evictions: cache.evictions,
            expirations: cache.expirations,
            total_entries: cache.total_entries,
            dirty_entries: cache.dirty_entries,
            tombstones: cache.tombstones,
            hit_rate: cache.hit_rate(),
            flush,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for membership changes
#[derive(Debug, Clone, Serialize)]
pub struct MemberResponse {
    pub message: String,
    pub id: String,
}

impl MemberResponse {
    pub fn new(id: impl Into<String>, action: &str) -> Self {
        let id = id.into();
        Self {
            message: format!("Member '{}' {}", id, action),
            id,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
