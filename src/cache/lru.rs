//! LRU Cache Module
//!
//! Byte-bounded least-recently-used cache. Not safe for concurrent access;
//! see [`LocalCache`](crate::cache::LocalCache) for the locked wrapper.

use std::collections::HashMap;
use std::fmt;

// == Value ==
/// Anything stored in the cache must report its size in bytes.
pub trait Value {
    fn len(&self) -> usize;
}

/// Called with the key and value of every entry evicted for capacity.
pub type EvictionCallback<V> = Box<dyn FnMut(String, V) + Send>;

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

// == LRU Cache ==
/// Tracks entries in recency order for eviction.
///
/// Entries live in a slot vector linked as a doubly linked list where:
/// - Head = Most recently used
/// - Tail = Least recently used
///
/// `index` maps every key to its slot. An entry's size is its key length
/// plus its value length; `nbytes` is the sum over all entries and never
/// exceeds `max_bytes` after an insert returns. A `max_bytes` of 0 means
/// unbounded.
pub struct Cache<V: Value> {
    max_bytes: usize,
    nbytes: usize,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    index: HashMap<String, usize>,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: Value> Cache<V> {
    // == Constructor ==
    /// Creates an empty cache holding at most `max_bytes`.
    ///
    /// The callback runs synchronously inside [`Cache::remove_oldest`]; it
    /// must not call back into the same cache.
    pub fn new(max_bytes: usize, on_evicted: Option<EvictionCallback<V>>) -> Self {
        Self {
            max_bytes,
            nbytes: 0,
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
            on_evicted,
        }
    }

    // == Get ==
    /// Looks up a key, marking it as most recently used on a hit.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    // == Add ==
    /// Inserts or replaces a value, then evicts from the tail until the
    /// cache fits its budget again.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            self.move_to_front(idx);
            if let Some(node) = self.slots[idx].as_mut() {
                self.nbytes = self.nbytes - node.value.len() + value.len();
                node.value = value;
            }
        } else {
            self.nbytes += key.len() + value.len();
            let idx = self.alloc(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.attach_front(idx);
            self.index.insert(key, idx);
        }

        while self.max_bytes != 0 && self.nbytes > self.max_bytes {
            self.remove_oldest();
        }
    }

    // == Remove Oldest ==
    /// Evicts the least recently used entry. No-op when empty.
    pub fn remove_oldest(&mut self) {
        let Some(idx) = self.tail else {
            return;
        };
        self.detach(idx);
        let Some(node) = self.slots[idx].take() else {
            return;
        };
        self.free.push(idx);
        self.index.remove(&node.key);
        self.nbytes -= node.key.len() + node.value.len();

        if let Some(callback) = self.on_evicted.as_mut() {
            callback(node.key, node.value);
        }
    }

    // == Length ==
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current usage in bytes.
    pub fn bytes(&self) -> usize {
        self.nbytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> Keys<'_, V> {
        Keys {
            cache: self,
            cursor: self.head,
        }
    }

    fn alloc(&mut self, node: Node<V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(node) = self.slots[h].as_mut() {
                    node.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }
}

impl<V: Value> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("max_bytes", &self.max_bytes)
            .field("nbytes", &self.nbytes)
            .field("len", &self.index.len())
            .finish()
    }
}

/// Iterator over keys in recency order, see [`Cache::keys`].
pub struct Keys<'a, V: Value> {
    cache: &'a Cache<V>,
    cursor: Option<usize>,
}

impl<'a, V: Value> Iterator for Keys<'a, V> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cache.slots[self.cursor?].as_ref()?;
        self.cursor = node.next;
        Some(node.key.as_str())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Text(String);

    impl Value for Text {
        fn len(&self) -> usize {
            self.0.len()
        }
    }

    fn text(s: &str) -> Text {
        Text(s.to_string())
    }

    #[test]
    fn test_get_hit_and_miss() {
        let mut lru = Cache::new(0, None);
        lru.add("key1", text("1234"));

        assert_eq!(lru.get("key1"), Some(&text("1234")));
        assert_eq!(lru.get("key2"), None);
    }

    #[test]
    fn test_remove_oldest_on_overflow() {
        let (k1, k2, k3) = ("key1", "key2", "k3");
        let (v1, v2, v3) = ("value1", "value2", "v3");
        let cap = k1.len() + k2.len() + v1.len() + v2.len();

        let mut lru = Cache::new(cap, None);
        lru.add(k1, text(v1));
        lru.add(k2, text(v2));
        lru.add(k3, text(v3));

        assert!(lru.get("key1").is_none());
        assert_eq!(lru.len(), 2);
        assert!(lru.bytes() <= cap);
    }

    #[test]
    fn test_get_promotes_entry() {
        let mut lru = Cache::new(30, None);
        lru.add("a", text("aaaaaaaaa"));
        lru.add("b", text("bbbbbbbbb"));
        lru.add("c", text("ccccccccc"));

        lru.get("a");
        lru.add("d", text("ddddddddd"));

        assert!(lru.get("a").is_some());
        assert!(lru.get("b").is_none());
        assert_eq!(lru.keys().collect::<Vec<_>>(), vec!["a", "d", "c"]);
    }

    #[test]
    fn test_on_evicted_receives_evicted_entries() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let callback: EvictionCallback<Text> = Box::new(move |key: String, value: Text| {
            sink.lock().unwrap().push((key, value));
        });

        let mut lru = Cache::new(10, Some(callback));
        lru.add("key1", text("123456"));
        lru.add("k2", text("k2"));
        lru.add("k3", text("k3"));
        lru.add("k4", text("k4"));

        let evicted = evicted.lock().unwrap();
        assert_eq!(*evicted, vec![("key1".to_string(), text("123456")), ("k2".to_string(), text("k2"))]);
    }

    #[test]
    fn test_update_adjusts_usage() {
        let mut lru = Cache::new(0, None);
        lru.add("k", text("short"));
        assert_eq!(lru.bytes(), 6);

        lru.add("k", text("much longer"));
        assert_eq!(lru.bytes(), 12);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.get("k"), Some(&text("much longer")));
    }

    #[test]
    fn test_update_promotes_entry() {
        let mut lru = Cache::new(0, None);
        lru.add("a", text("1"));
        lru.add("b", text("2"));
        lru.add("a", text("3"));

        assert_eq!(lru.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let mut lru = Cache::new(0, None);
        for i in 0..1000 {
            lru.add(format!("key{i}"), text("value"));
        }
        assert_eq!(lru.len(), 1000);
    }

    #[test]
    fn test_oversized_entry_is_evicted_immediately() {
        let mut lru = Cache::new(4, None);
        lru.add("ab", text("cd"));
        lru.add("big", text("too large"));

        assert!(lru.is_empty());
        assert_eq!(lru.bytes(), 0);
    }

    #[test]
    fn test_remove_oldest_empty() {
        let mut lru: Cache<Text> = Cache::new(10, None);
        lru.remove_oldest();
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut lru = Cache::new(4, None);
        for i in 0..100 {
            lru.add(format!("k{i}"), text("v"));
        }
        assert_eq!(lru.len(), 1);
        assert!(lru.slots.len() <= 2);
    }
}
