//! Request DTOs for the cache HTTP API
//!
//! Defines the structure of incoming query strings.

use serde::Deserialize;

/// Query string of the front-end lookup (GET /api?key=...)
///
/// A missing key deserializes as empty and is rejected by the group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiQuery {
    /// The cache key
    #[serde(default)]
    pub key: String,
}

/// Query string of the peer endpoint for groups or keys that cannot travel
/// as path segments (GET {base_path}?group=...&key=...)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeerQuery {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub key: String,
}
