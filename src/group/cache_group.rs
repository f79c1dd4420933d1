//! Cache Group
//!
//! Serves keys from the local tier, a remote peer, or the data source.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{ByteView, CacheStats, EvictionListener, LocalCache, StatsSnapshot};
use crate::error::{CacheError, Result};
use crate::group::Getter;
use crate::peers::{PeerGetter, PeerPicker};
use crate::singleflight;

// == Group ==
/// A named cache namespace and the data loaded into it.
pub struct Group {
    name: String,
    getter: Box<dyn Getter>,
    main_cache: LocalCache,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    /// Makes sure each key is only fetched once, locally or remotely,
    /// regardless of the number of concurrent callers.
    loader: singleflight::Group<ByteView>,
    load_timeout: Option<Duration>,
    stats: CacheStats,
}

impl Group {
    // == Constructor ==
    /// Creates a group whose local tier holds at most `cache_bytes`.
    ///
    /// Groups are usually created through
    /// [`Registry::create_group`](crate::group::Registry::create_group).
    pub fn new(name: impl Into<String>, cache_bytes: usize, getter: impl Getter + 'static) -> Self {
        Self {
            name: name.into(),
            getter: Box::new(getter),
            main_cache: LocalCache::new(cache_bytes),
            peers: OnceLock::new(),
            loader: singleflight::Group::new(),
            load_timeout: None,
            stats: CacheStats::new(),
        }
    }

    /// Bounds every load. All callers waiting on the key share the timeout.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn with_eviction_listener(mut self, listener: EvictionListener) -> Self {
        self.main_cache = self.main_cache.with_listener(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // == Register Peers ==
    /// Installs the picker used to route keys to remote peers.
    ///
    /// May be called once; a second call is a configuration error.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(peers)
            .map_err(|_| CacheError::PeersAlreadyRegistered(self.name.clone()))
    }

    // == Get ==
    /// Returns the value for `key`.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        self.stats.record_get();
        if let Some(value) = self.main_cache.get(key) {
            self.stats.record_hit();
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        self.load(key).await
    }

    /// Snapshot of the counters and local tier usage.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats
            .snapshot(self.main_cache.len(), self.main_cache.bytes())
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.loader
            .work(key, || async {
                self.stats.record_load();
                let Some(after) = self.load_timeout else {
                    return self.fetch(key).await;
                };
                match tokio::time::timeout(after, self.fetch(key)).await {
                    Ok(result) => result,
                    Err(_) => Err(CacheError::Timeout {
                        key: key.to_string(),
                        after,
                    }),
                }
            })
            .await
    }

    async fn fetch(&self, key: &str) -> Result<ByteView> {
        if let Some(peer) = self.peers.get().and_then(|peers| peers.pick_peer(key)) {
            match self.get_from_peer(peer.as_ref(), key).await {
                Ok(value) => {
                    self.stats.record_peer_load();
                    return Ok(value);
                }
                Err(err) => {
                    self.stats.record_peer_error();
                    warn!(group = %self.name, key, error = %err, "failed to get from peer");
                }
            }
        }

        self.get_locally(key).await
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bytes = peer.get(&self.name, key).await?;
        Ok(ByteView::from(bytes))
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = match self.getter.get(key).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.stats.record_local_load_error();
                return Err(err);
            }
        };
        self.stats.record_local_load();
        debug!(group = %self.name, key, "loaded from source");

        let value = ByteView::copy_from(&bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        let evicted = self.main_cache.add(key, value);
        if evicted > 0 {
            self.stats.record_evictions(evicted as u64);
        }
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("main_cache", &self.main_cache)
            .field("has_peers", &self.peers.get().is_some())
            .field("load_timeout", &self.load_timeout)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn db() -> HashMap<&'static str, &'static str> {
        HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")])
    }

    /// Getter backed by `db()` that counts its calls per key.
    fn counting_getter(counts: Arc<parking_lot::Mutex<HashMap<String, usize>>>) -> impl Getter {
        let db = db();
        move |key: &str| -> Result<Vec<u8>> {
            *counts.lock().entry(key.to_string()).or_default() += 1;
            db.get(key)
                .map(|v| v.as_bytes().to_vec())
                .ok_or_else(|| CacheError::NotFound(key.to_string()))
        }
    }

    struct FixedPicker(Option<Arc<dyn PeerGetter>>);

    impl PeerPicker for FixedPicker {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            self.0.clone()
        }
    }

    struct FailingPeer(AtomicUsize);

    #[async_trait]
    impl PeerGetter for FailingPeer {
        async fn get(&self, _group: &str, _key: &str) -> Result<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Peer("connection refused".to_string()))
        }
    }

    struct EchoPeer;

    #[async_trait]
    impl PeerGetter for EchoPeer {
        async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
            Ok(format!("{group}/{key}").into_bytes())
        }
    }

    #[tokio::test]
    async fn test_get_loads_once_then_hits() {
        let counts = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_getter(Arc::clone(&counts)));

        for (key, value) in db() {
            assert_eq!(group.get(key).await.unwrap().to_string(), value);
            assert_eq!(group.get(key).await.unwrap().to_string(), value);
            assert_eq!(counts.lock()[key], 1, "cache {key} miss");
        }

        let stats = group.stats();
        assert_eq!(stats.gets, 6);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.local_loads, 3);
        assert_eq!(stats.entries, 3);
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_cached() {
        let counts = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_getter(Arc::clone(&counts)));

        let err = group.get("unknown").await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound(ref key) if key == "unknown"));
        assert!(group.get("unknown").await.is_err());

        assert_eq!(counts.lock()["unknown"], 2);
        assert_eq!(group.stats().entries, 0);
        assert_eq!(group.stats().local_load_errors, 2);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let group = Group::new("scores", 0, |_: &str| -> Result<Vec<u8>> { Ok(Vec::new()) });
        assert!(matches!(group.get("").await, Err(CacheError::EmptyKey)));
        assert_eq!(group.stats().gets, 0);
    }

    #[tokio::test]
    async fn test_failing_peer_falls_back_to_getter() {
        let counts = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_getter(Arc::clone(&counts)));
        let peer = Arc::new(FailingPeer(AtomicUsize::new(0)));
        group
            .register_peers(Arc::new(FixedPicker(Some(peer.clone()))))
            .unwrap();

        assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
        assert_eq!(peer.0.load(Ordering::SeqCst), 1);
        assert_eq!(counts.lock()["Tom"], 1);

        let stats = group.stats();
        assert_eq!(stats.peer_errors, 1);
        assert_eq!(stats.local_loads, 1);
    }

    #[tokio::test]
    async fn test_peer_value_is_not_cached_locally() {
        let group = Group::new("scores", 2 << 10, |key: &str| -> Result<Vec<u8>> {
            Err(CacheError::NotFound(key.to_string()))
        });
        group
            .register_peers(Arc::new(FixedPicker(Some(Arc::new(EchoPeer)))))
            .unwrap();

        assert_eq!(group.get("Tom").await.unwrap().to_string(), "scores/Tom");
        assert_eq!(group.get("Tom").await.unwrap().to_string(), "scores/Tom");

        let stats = group.stats();
        assert_eq!(stats.peer_loads, 2);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_picker_without_peer_loads_locally() {
        let counts = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_getter(Arc::clone(&counts)));
        group.register_peers(Arc::new(FixedPicker(None))).unwrap();

        assert_eq!(group.get("Jack").await.unwrap().to_string(), "589");
        assert_eq!(group.stats().entries, 1);
    }

    #[test]
    fn test_register_peers_twice_fails() {
        let group = Group::new("scores", 0, |_: &str| -> Result<Vec<u8>> { Ok(Vec::new()) });
        group.register_peers(Arc::new(FixedPicker(None))).unwrap();

        let err = group
            .register_peers(Arc::new(FixedPicker(None)))
            .unwrap_err();
        assert!(matches!(err, CacheError::PeersAlreadyRegistered(ref name) if name == "scores"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_load_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let group = Arc::new(Group::new("scores", 2 << 10, move |_: &str| -> Result<Vec<u8>> {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            Ok(b"630".to_vec())
        }));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let group = Arc::clone(&group);
                tokio::spawn(async move { group.get("Tom").await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().to_string(), "630");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().loads, 1);
    }

    #[tokio::test]
    async fn test_load_timeout() {
        struct SlowGetter;

        #[async_trait]
        impl Getter for SlowGetter {
            async fn get(&self, _key: &str) -> Result<Vec<u8>> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(b"late".to_vec())
            }
        }

        let group = Group::new("scores", 0, SlowGetter).with_load_timeout(Duration::from_millis(20));

        let err = group.get("Tom").await.unwrap_err();
        assert!(matches!(err, CacheError::Timeout { ref key, .. } if key == "Tom"));
        assert_eq!(group.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_evictions_are_counted_and_reported() {
        let evicted = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let listener: EvictionListener = Arc::new(move |key, _| sink.lock().push(key.to_string()));

        let counts = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let group = Group::new("scores", 13, counting_getter(counts)).with_eviction_listener(listener);

        group.get("Tom").await.unwrap();
        group.get("Sam").await.unwrap();
        group.get("Jack").await.unwrap();

        assert_eq!(*evicted.lock(), vec!["Tom".to_string()]);
        assert_eq!(group.stats().evictions, 1);
        assert!(group.stats().bytes <= 13);
    }
}
