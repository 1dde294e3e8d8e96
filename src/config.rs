//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::error::{GridError, Result};

/// Which persistent store backend the node writes through to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

impl FromStr for StoreBackend {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            other => Err(GridError::InvalidRequest(format!(
                "Unknown store backend: {}",
                other
            ))),
        }
    }
}

/// A simulated peer joined at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub id: String,
    pub address: SocketAddr,
}

impl FromStr for PeerConfig {
    type Err = GridError;

    /// Parses `id@host:port`.
    fn from_str(s: &str) -> Result<Self> {
        let (id, address) = s
            .trim()
            .split_once('@')
            .ok_or_else(|| GridError::InvalidRequest(format!("Peer must be id@address: {}", s)))?;
        if id.is_empty() {
            return Err(GridError::InvalidRequest(format!("Peer id is empty: {}", s)));
        }
        let address = address
            .parse()
            .map_err(|_| GridError::InvalidRequest(format!("Invalid peer address: {}", address)))?;
        Ok(Self {
            id: id.to_string(),
            address,
        })
    }
}

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifier of this member
    pub node_id: String,
    /// Address this member advertises to the cluster
    pub node_address: SocketAddr,
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of entries each replica can hold
    pub max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL, 0 disables expiry
    pub default_ttl: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    pub partition_count: u32,
    /// Owners per partition, primary included
    pub replication_factor: usize,
    /// Owner acknowledgements required before a write returns
    pub write_quorum: usize,
    pub flush_max_attempts: u32,
    pub flush_initial_backoff_ms: u64,
    pub flush_max_backoff_ms: u64,
    /// Interval in seconds between re-queues of dirty entries
    pub sweep_interval: u64,
    pub store_backend: StoreBackend,
    /// Root directory of the file backend
    pub data_dir: PathBuf,
    pub peers: Vec<PeerConfig>,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    let Ok(raw) = env::var(name) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!("Ignoring invalid {}={:?}, using the default", name, raw);
            default
        }
    }
}

/// An unknown backend is an error: falling back would silently drop
/// persistence.
fn parse_store_backend(raw: Option<&str>) -> Result<StoreBackend> {
    match raw {
        None => Ok(StoreBackend::default()),
        Some(raw) => raw.parse().map_err(|_| {
            GridError::InvalidRequest(format!(
                "STORE_BACKEND must be memory or file, got {:?}",
                raw
            ))
        }),
    }
}

fn parse_peers(raw: &str) -> Vec<PeerConfig> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match entry.parse() {
            Ok(peer) => Some(peer),
            Err(e) => {
                warn!("Ignoring cluster peer: {}", e);
                None
            }
        })
        .collect()
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `NODE_ID` - Member identifier (default: node-1)
    /// - `NODE_ADDRESS` - Advertised member address (default: 127.0.0.1:3000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MAX_ENTRIES` - Maximum entries per replica (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 for none (default: 300)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `PARTITION_COUNT` - Number of partitions (default: 271)
    /// - `REPLICATION_FACTOR` - Owners per partition (default: 2)
    /// - `WRITE_QUORUM` - Acknowledgements per write (default: 1)
    /// - `FLUSH_MAX_ATTEMPTS` - Store attempts per flush (default: 5)
    /// - `FLUSH_INITIAL_BACKOFF_MS` - First retry delay (default: 50)
    /// - `FLUSH_MAX_BACKOFF_MS` - Retry delay cap (default: 2000)
    /// - `SWEEP_INTERVAL` - Dirty entry sweep frequency in seconds (default: 5)
    /// - `STORE_BACKEND` - `memory` or `file` (default: memory)
    /// - `DATA_DIR` - File backend directory (default: ./data)
    /// - `CLUSTER_PEERS` - Comma separated `id@address` peers (default: none)
    ///
    /// Malformed numeric values fall back to their default with a warning.
    /// An unknown `STORE_BACKEND` is an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let store_backend = parse_store_backend(env::var("STORE_BACKEND").ok().as_deref())?;
        Ok(Self {
            node_id: env::var("NODE_ID").unwrap_or(defaults.node_id),
            node_address: env_or("NODE_ADDRESS", defaults.node_address),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            partition_count: env_or("PARTITION_COUNT", defaults.partition_count),
            replication_factor: env_or("REPLICATION_FACTOR", defaults.replication_factor),
            write_quorum: env_or("WRITE_QUORUM", defaults.write_quorum),
            flush_max_attempts: env_or("FLUSH_MAX_ATTEMPTS", defaults.flush_max_attempts),
            flush_initial_backoff_ms: env_or(
                "FLUSH_INITIAL_BACKOFF_MS",
                defaults.flush_initial_backoff_ms,
            ),
            flush_max_backoff_ms: env_or("FLUSH_MAX_BACKOFF_MS", defaults.flush_max_backoff_ms),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            store_backend,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            peers: env::var("CLUSTER_PEERS")
                .map(|raw| parse_peers(&raw))
                .unwrap_or_default(),
        })
    }

    /// Rejects settings the cluster cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(GridError::InvalidRequest("NODE_ID cannot be empty".to_string()));
        }
        if self.partition_count == 0 {
            return Err(GridError::InvalidRequest(
                "PARTITION_COUNT must be at least 1".to_string(),
            ));
        }
        if self.replication_factor == 0 {
            return Err(GridError::InvalidRequest(
                "REPLICATION_FACTOR must be at least 1".to_string(),
            ));
        }
        if self.write_quorum == 0 || self.write_quorum > self.replication_factor {
            return Err(GridError::InvalidRequest(format!(
                "WRITE_QUORUM must be between 1 and REPLICATION_FACTOR ({})",
                self.replication_factor
            )));
        }
        if self.max_entries == 0 {
            return Err(GridError::InvalidRequest(
                "MAX_ENTRIES must be at least 1".to_string(),
            ));
        }
        if self.flush_initial_backoff_ms > self.flush_max_backoff_ms {
            return Err(GridError::InvalidRequest(format!(
                "FLUSH_INITIAL_BACKOFF_MS ({}) exceeds FLUSH_MAX_BACKOFF_MS ({})",
                self.flush_initial_backoff_ms, self.flush_max_backoff_ms
            )));
        }
        if let Some(peer) = self.peers.iter().find(|p| p.id == self.node_id) {
            return Err(GridError::InvalidRequest(format!(
                "Peer {} has the local node id",
                peer.id
            )));
        }
        Ok(())
    }

    /// TTL applied to writes that carry none.
    pub fn default_ttl(&self) -> Option<u64> {
        (self.default_ttl > 0).then_some(self.default_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "node-1".to_string(),
            node_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            server_port: 3000,
            max_entries: 1000,
            default_ttl: 300,
            cleanup_interval: 1,
            partition_count: 271,
            replication_factor: 2,
            write_quorum: 1,
            flush_max_attempts: 5,
            flush_initial_backoff_ms: 50,
            flush_max_backoff_ms: 2000,
            sweep_interval: 5,
            store_backend: StoreBackend::Memory,
            data_dir: PathBuf::from("./data"),
            peers: Vec::new(),
        }
    }
}
