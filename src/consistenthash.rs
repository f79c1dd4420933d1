//! Consistent Hash Module
//!
//! Maps keys onto a set of peers through a ring of virtual replicas.
//!
//! Every peer contributes `replicas` points, each the hash of
//! `"{index}{peer}"`. A key is owned by the first point at or after the
//! key's own hash, wrapping around to the first point on the ring.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Hashes bytes onto the ring.
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

// == Hash Ring ==
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    peers: Vec<String>,
    /// Sorted replica points
    keys: Vec<u32>,
    /// Replica point -> owning peer
    hash_map: HashMap<u32, String>,
}

impl HashRing {
    // == Constructor ==
    /// Creates an empty ring. Uses CRC-32 (IEEE) when no hash function is given.
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            hash: hash.unwrap_or_else(|| Arc::new(crc32fast::hash) as HashFn),
            replicas,
            peers: Vec::new(),
            keys: Vec::new(),
            hash_map: HashMap::new(),
        }
    }

    // == Add ==
    /// Adds peers to the ring and re-sorts the replica points.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for peer in peers {
            let peer = peer.into();
            self.insert_points(&peer);
            self.peers.push(peer);
        }
        self.keys.sort_unstable();
    }

    // == Remove ==
    /// Drops a peer's replica points. Returns false if the peer is unknown.
    pub fn remove(&mut self, peer: &str) -> bool {
        let before = self.peers.len();
        self.peers.retain(|p| p != peer);
        if self.peers.len() == before {
            return false;
        }

        // Rebuild so colliding points fall back to the remaining owners.
        self.keys.clear();
        self.hash_map.clear();
        for peer in std::mem::take(&mut self.peers) {
            self.insert_points(&peer);
            self.peers.push(peer);
        }
        self.keys.sort_unstable();
        true
    }

    // == Get ==
    /// Returns the peer owning `key`, or None if the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&point| point < hash);
        self.hash_map
            .get(&self.keys[idx % self.keys.len()])
            .map(String::as_str)
    }

    /// Number of replica points on the ring.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registered peers in registration order.
    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    fn insert_points(&mut self, peer: &str) {
        for i in 0..self.replicas {
            let point = (self.hash)(format!("{i}{peer}").as_bytes());
            self.keys.push(point);
            self.hash_map.insert(point, peer.to_string());
        }
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("peers", &self.peers)
            .field("points", &self.keys.len())
            .finish()
    }
}
