//! HTTP Peers
//!
//! [`HttpPool`] routes keys across peers with a hash ring; [`HttpGetter`]
//! fetches values from a peer's `{base_path}{group}/{key}` endpoint.
//!
//! URL normalisation drops `.` and `..` path segments even when they are
//! percent-encoded, so a group or key spelled that way is sent as
//! `{base_path}?group=..&key=..` instead.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use tracing::debug;

use super::{PeerGetter, PeerPicker};
use crate::consistenthash::HashRing;
use crate::error::{CacheError, Result};

/// Path prefix of the peer endpoint.
pub const DEFAULT_BASE_PATH: &str = "/_meshcache/";

/// Virtual replicas per peer on the ring.
pub const DEFAULT_REPLICAS: usize = 50;

// == HTTP Pool ==
/// The set of HTTP peers this node knows about, itself included.
pub struct HttpPool {
    /// This node's base URL, e.g. `http://localhost:8001`
    self_addr: String,
    base_path: String,
    replicas: usize,
    client: reqwest::Client,
    state: Mutex<PoolState>,
}

struct PoolState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

impl HttpPool {
    // == Constructor ==
    pub fn new(self_addr: impl Into<String>) -> Self {
        let self_addr: String = self_addr.into();
        Self {
            self_addr: self_addr.trim_end_matches('/').to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            client: reqwest::Client::new(),
            state: Mutex::new(PoolState {
                ring: HashRing::new(DEFAULT_REPLICAS, None),
                getters: HashMap::new(),
            }),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self.state.get_mut().ring = HashRing::new(replicas, None);
        self
    }

    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    // == Set ==
    /// Replaces the peer list. Each peer is a base URL like
    /// `http://10.0.0.2:8008`; a trailing `/` is ignored.
    pub fn set<S: AsRef<str>>(&self, peers: &[S]) {
        let peers: Vec<&str> = peers
            .iter()
            .map(|peer| peer.as_ref().trim_end_matches('/'))
            .collect();

        let mut ring = HashRing::new(self.replicas, None);
        ring.add(peers.iter().copied());

        let getters = peers
            .iter()
            .map(|&peer| {
                let getter = HttpGetter::with_client(
                    format!("{}{}", peer, self.base_path),
                    self.client.clone(),
                );
                (peer.to_string(), Arc::new(getter))
            })
            .collect();

        *self.state.lock() = PoolState { ring, getters };
    }

    /// Peers currently on the ring.
    pub fn peers(&self) -> Vec<String> {
        self.state.lock().ring.peers().to_vec()
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.lock();
        let peer = state.ring.get(key)?;
        if peer == self.self_addr {
            return None;
        }
        debug!(server = %self.self_addr, peer, key, "picked peer");
        let getter = state.getters.get(peer)?;
        Some(Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

impl fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_addr", &self.self_addr)
            .field("base_path", &self.base_path)
            .field("ring", &self.state.lock().ring)
            .finish()
    }
}

// == HTTP Getter ==
/// Client side of one peer.
#[derive(Debug, Clone)]
pub struct HttpGetter {
    /// Peer URL including the base path, e.g. `http://localhost:8002/_meshcache/`
    base_url: String,
    client: reqwest::Client,
}

impl HttpGetter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds `{base_url}{group}/{key}` with both segments percent-encoded,
    /// or `{base_url}?group=..&key=..` when either is a dot segment.
    pub(crate) fn url_for(&self, group: &str, key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CacheError::Peer(format!("invalid peer url {}: {}", self.base_url, e)))?;
        if is_dot_segment(group) || is_dot_segment(key) {
            url.query_pairs_mut()
                .append_pair("group", group)
                .append_pair("key", key);
            return Ok(url);
        }
        url.path_segments_mut()
            .map_err(|_| CacheError::Peer(format!("invalid peer url {}", self.base_url)))?
            .pop_if_empty()
            .push(group)
            .push(key);
        Ok(url)
    }
}

fn is_dot_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

#[async_trait]
impl PeerGetter for HttpGetter {
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.url_for(group, key)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::Peer(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CacheError::Peer(format!(
                "server returned: {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Peer(format!("reading response body: {}", e)))?;
        Ok(body.to_vec())
    }
}
