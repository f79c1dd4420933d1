//! Peers Module
//!
//! Capabilities a group uses to reach other nodes, plus their HTTP
//! implementation.
//!
//! A [`PeerPicker`] decides which node owns a key; the [`PeerGetter`] it
//! returns fetches the value from that node.

mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use http::{HttpGetter, HttpPool, DEFAULT_BASE_PATH, DEFAULT_REPLICAS};

/// Locates the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the owning peer, or None when the key should be loaded
    /// locally.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Fetches a key of a group from one peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>>;
}
