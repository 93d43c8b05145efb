//! Byte-bounded LRU Store
//!
//! Least-recently-used cache whose budget is counted in bytes
//! (`len(key) + len(value)` per entry) rather than entry count.
//!
//! # Design
//!
//! ```text
//!   slots (Vec<Option<Node<V>>>)          index (HashMap<String, usize>)
//!   ┌────┬──────────────────────────┐     ┌────────┬──────┐
//!   │ 0  │ { "Tom", prev: -, next: 2 }   │ "Tom"  │  0   │
//!   │ 1  │ free                     │     │ "Sam"  │  2   │
//!   │ 2  │ { "Sam", prev: 0, next: - }   └────────┴──────┘
//!   └────┴──────────────────────────┘
//!
//!   head (MRU) ─► [0] ◄──► [2] ◄── tail (LRU)
//! ```
//!
//! - Nodes live in a slot vector and link to each other by index, so
//!   promotion and eviction are O(1) without unsafe pointer juggling.
//! - Freed slots are recycled through a free list.
//! - `max_bytes == 0` disables eviction (unbounded store).
//!
//! The store itself is not synchronized; [`MainCache`](super::MainCache)
//! wraps it in a mutex for shared use.

use std::collections::HashMap;
use std::fmt;

use super::byteview::ByteSize;

/// Callback invoked with each evicted entry, after it has left the store.
pub type EvictionCallback<V> = Box<dyn FnMut(String, V) + Send>;

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Byte-bounded LRU cache
pub struct LruCache<V> {
    /// Byte budget (0 = unbounded)
    max_bytes: usize,
    /// Bytes currently accounted (keys + values)
    used_bytes: usize,
    /// Node storage
    slots: Vec<Option<Node<V>>>,
    /// Recycled slot indices
    free: Vec<usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    /// Key -> slot
    index: HashMap<String, usize>,
    /// Eviction notification
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: ByteSize> LruCache<V> {
    /// Create a cache holding at most `max_bytes` bytes (0 = unbounded)
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
            on_evicted: None,
        }
    }

    /// Create a cache that reports every evicted entry to `on_evicted`
    pub fn with_eviction_callback<F>(max_bytes: usize, on_evicted: F) -> Self
    where
        F: FnMut(String, V) + Send + 'static,
    {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(Box::new(on_evicted));
        cache
    }

    /// Look up a key, promoting it to most-recently-used on a hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let id = *self.index.get(key)?;
        self.move_to_front(id);
        self.slots[id].as_ref().map(|node| &node.value)
    }

    /// Look up a key without touching recency
    pub fn peek(&self, key: &str) -> Option<&V> {
        let id = *self.index.get(key)?;
        self.slots[id].as_ref().map(|node| &node.value)
    }

    /// Insert or replace a value, then evict until the budget holds
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&id) = self.index.get(&key) {
            if let Some(node) = self.slots[id].as_mut() {
                let old = std::mem::replace(&mut node.value, value);
                // Key length is unchanged; only the value delta matters.
                self.used_bytes = self.used_bytes - old.byte_size() + node.value.byte_size();
            }
            self.move_to_front(id);
        } else {
            self.used_bytes += key.len() + value.byte_size();
            let id = self.alloc(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.attach_front(id);
            self.index.insert(key, id);
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    /// Evict the least-recently-used entry, if any
    pub fn remove_oldest(&mut self) {
        self.evict_oldest();
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently accounted against the budget
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Byte budget (0 = unbounded)
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Keys ordered from most to least recently used
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(id) = cursor {
            match self.slots[id].as_ref() {
                Some(node) => {
                    keys.push(node.key.clone());
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn evict_oldest(&mut self) -> bool {
        let Some(id) = self.tail else {
            return false;
        };
        self.detach(id);
        let Some(node) = self.slots[id].take() else {
            return false;
        };
        self.free.push(id);
        self.index.remove(&node.key);
        self.used_bytes -= node.key.len() + node.value.byte_size();

        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(node.key, node.value);
        }
        true
    }

    fn alloc(&mut self, node: Node<V>) -> usize {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn move_to_front(&mut self, id: usize) {
        if self.head == Some(id) {
            return;
        }
        self.detach(id);
        self.attach_front(id);
    }

    fn detach(&mut self, id: usize) {
        let (prev, next) = match self.slots[id].as_ref() {
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

        if let Some(node) = self.slots[id].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn attach_front(&mut self, id: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[id].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(node) = self.slots[h].as_mut() {
                    node.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("len", &self.index.len())
            .field("has_eviction_callback", &self.on_evicted.is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
