//! Local Cache Module
//!
//! The mutex-guarded local tier of a group.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::lru::{Cache, EvictionCallback};
use crate::cache::ByteView;

/// Notified of every entry the local tier evicts for capacity.
///
/// Runs after the cache lock has been released, so it may call back into
/// the same cache.
pub type EvictionListener = Arc<dyn Fn(&str, &ByteView) + Send + Sync>;

type Evicted = Arc<Mutex<Vec<(String, ByteView)>>>;

// == Local Cache ==
/// Thread-safe wrapper around the byte-bounded [`Cache`].
///
/// The underlying cache is created on first insert.
pub struct LocalCache {
    cache_bytes: usize,
    lru: Mutex<Option<Cache<ByteView>>>,
    evicted: Evicted,
    listener: Option<EvictionListener>,
}

impl LocalCache {
    // == Constructor ==
    /// Creates a local tier holding at most `cache_bytes` (0 = unbounded).
    pub fn new(cache_bytes: usize) -> Self {
        Self {
            cache_bytes,
            lru: Mutex::new(None),
            evicted: Arc::new(Mutex::new(Vec::new())),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: EvictionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    // == Add ==
    /// Stores a value and returns how many entries were evicted to make room.
    pub fn add(&self, key: &str, value: ByteView) -> usize {
        let evicted = {
            let mut guard = self.lru.lock();
            let lru = guard.get_or_insert_with(|| {
                let sink = Arc::clone(&self.evicted);
                let callback: EvictionCallback<ByteView> = Box::new(move |key: String, value: ByteView| {
                    sink.lock().push((key, value));
                });
                Cache::new(self.cache_bytes, Some(callback))
            });
            lru.add(key, value);
            std::mem::take(&mut *self.evicted.lock())
        };

        if let Some(listener) = &self.listener {
            for (key, value) in &evicted {
                listener(key, value);
            }
        }
        evicted.len()
    }

    // == Get ==
    /// Returns a shared view of the cached value, if present.
    pub fn get(&self, key: &str) -> Option<ByteView> {
        self.lru.lock().as_mut()?.get(key).cloned()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, Cache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently held.
    pub fn bytes(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, Cache::bytes)
    }

    pub fn cache_bytes(&self) -> usize {
        self.cache_bytes
    }
}

impl fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCache")
            .field("cache_bytes", &self.cache_bytes)
            .field("lru", &*self.lru.lock())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::thread;

    #[test]
    fn test_get_before_first_add() {
        let cache = LocalCache::new(64);
        assert!(cache.get("missing").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.bytes(), 0);
    }

    #[test]
    fn test_add_and_get() {
        let cache = LocalCache::new(64);
        assert_eq!(cache.add("Tom", ByteView::from("630")), 0);

        assert_eq!(cache.get("Tom").map(|v| v.to_string()), Some("630".to_string()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes(), 6);
    }

    #[test]
    fn test_add_reports_evictions() {
        let cache = LocalCache::new(12);
        cache.add("Tom", ByteView::from("630"));
        cache.add("Jack", ByteView::from("589"));

        assert_eq!(cache.add("Sam", ByteView::from("567")), 1);
        assert!(cache.get("Tom").is_none());
    }

    #[test]
    fn test_listener_may_reenter_cache() {
        let slot: Arc<OnceLock<Arc<LocalCache>>> = Arc::new(OnceLock::new());
        let handle = Arc::clone(&slot);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let listener: EvictionListener = Arc::new(move |key, value| {
            // Would deadlock if the cache lock were still held.
            let len = handle.get().map_or(usize::MAX, |cache| cache.len());
            sink.lock().push((key.to_string(), value.to_string(), len));
        });
        let cache = Arc::new(LocalCache::new(6).with_listener(listener));
        let _ = slot.set(Arc::clone(&cache));

        cache.add("Tom", ByteView::from("630"));
        cache.add("Sam", ByteView::from("567"));

        assert_eq!(
            *seen.lock(),
            vec![("Tom".to_string(), "630".to_string(), 1)]
        );
    }

    #[test]
    fn test_concurrent_adds_respect_budget() {
        let cache = Arc::new(LocalCache::new(100));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        cache.add(&format!("t{t}-k{i}"), ByteView::from("value"));
                        assert!(cache.bytes() <= 100);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.bytes() <= 100);
    }
}
