//! Configuration Module
//!
//! Handles loading and managing node configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::peers::{DEFAULT_BASE_PATH, DEFAULT_REPLICAS};

/// Node configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Byte budget of the local tier
    pub cache_bytes: usize,
    /// This node's peer base URL
    pub self_addr: String,
    /// Every node's peer base URL, this node included
    pub peer_addrs: Vec<String>,
    /// Virtual replicas per peer on the hash ring
    pub replicas: usize,
    /// Optional deadline around each load
    pub load_timeout: Option<Duration>,
    /// Front-end API listen address; the API server only runs when set
    pub api_addr: Option<String>,
    /// Path prefix of the peer endpoint
    pub base_path: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BYTES` - Local tier budget in bytes (default: 2048)
    /// - `SELF_ADDR` - This node's URL (default: http://localhost:8001)
    /// - `PEER_ADDRS` - Comma-separated node URLs (default: ports 8001-8003 on localhost)
    /// - `REPLICAS` - Virtual replicas per peer (default: 50)
    /// - `LOAD_TIMEOUT_MS` - Load deadline in milliseconds (default: none)
    /// - `API_ADDR` - Front-end API address such as `localhost:9999` (default: none)
    /// - `BASE_PATH` - Peer endpoint prefix (default: /_meshcache/)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_bytes: env::var("CACHE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_bytes),
            self_addr: env::var("SELF_ADDR").unwrap_or(defaults.self_addr),
            peer_addrs: env::var("PEER_ADDRS")
                .ok()
                .map(|v| parse_list(&v))
                .filter(|peers| !peers.is_empty())
                .unwrap_or(defaults.peer_addrs),
            replicas: env::var("REPLICAS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.replicas),
            load_timeout: env::var("LOAD_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
            api_addr: env::var("API_ADDR").ok().filter(|v| !v.is_empty()),
            base_path: env::var("BASE_PATH").unwrap_or(defaults.base_path),
        }
    }

    /// Socket address the peer server binds, taken from `self_addr`.
    pub fn listen_addr(&self) -> &str {
        let addr = self
            .self_addr
            .split_once("://")
            .map_or(self.self_addr.as_str(), |(_, rest)| rest);
        addr.trim_end_matches('/')
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_bytes: 2 << 10,
            self_addr: "http://localhost:8001".to_string(),
            peer_addrs: vec![
                "http://localhost:8001".to_string(),
                "http://localhost:8002".to_string(),
                "http://localhost:8003".to_string(),
            ],
            replicas: DEFAULT_REPLICAS,
            load_timeout: None,
            api_addr: None,
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }
}
