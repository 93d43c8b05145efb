//! Property-Based Tests for the LRU Store
//!
//! Drives random put/get sequences against both the store and a naive
//! recency list, then checks:
//!
//! 1. **Budget**: `used_bytes <= max_bytes` after every operation (unless unbounded)
//! 2. **Accounting**: `used_bytes` equals the sum of live entry sizes
//! 3. **Eviction order**: evicted keys are exactly the least recently touched, in order
//! 4. **Reads are free**: `get` never changes `used_bytes`

#![cfg(test)]

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use super::lru::LruCache;

#[derive(Debug, Clone)]
enum Op {
    Put(u8, usize),
    Get(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..16, 0usize..24).prop_map(|(k, len)| Op::Put(k, len)),
        1 => (0u8..16).prop_map(Op::Get),
    ]
}

fn key_of(k: u8) -> String {
    format!("key-{}", k)
}

/// Reference model: MRU-first list of (key, entry size)
#[derive(Default)]
struct Model {
    order: Vec<(String, usize)>,
    evicted: Vec<String>,
}

impl Model {
    fn used(&self) -> usize {
        self.order.iter().map(|(_, size)| size).sum()
    }

    fn touch(&mut self, key: &str) -> bool {
        match self.order.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                let entry = self.order.remove(pos);
                self.order.insert(0, entry);
                true
            }
            None => false,
        }
    }

    fn put(&mut self, key: String, value_len: usize, max_bytes: usize) {
        if let Some(pos) = self.order.iter().position(|(k, _)| *k == key) {
            self.order.remove(pos);
        }
        let size = key.len() + value_len;
        self.order.insert(0, (key, size));
        while max_bytes != 0 && self.used() > max_bytes {
            if let Some((k, _)) = self.order.pop() {
                self.evicted.push(k);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: store and model agree on contents, order, size and evictions.
    #[test]
    fn prop_matches_reference_model(
        max_bytes in prop_oneof![Just(0usize), 16usize..128],
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let mut lru = LruCache::with_eviction_callback(max_bytes, move |key: String, _value: Vec<u8>| {
            sink.lock().push(key);
        });
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Put(k, len) => {
                    lru.put(key_of(k), vec![0u8; len]);
                    model.put(key_of(k), len, max_bytes);
                }
                Op::Get(k) => {
                    let before = lru.used_bytes();
                    let hit = lru.get(&key_of(k)).is_some();
                    prop_assert_eq!(hit, model.touch(&key_of(k)));
                    prop_assert_eq!(lru.used_bytes(), before);
                }
            }

            if max_bytes != 0 {
                prop_assert!(lru.used_bytes() <= max_bytes);
            }
            prop_assert_eq!(lru.used_bytes(), model.used());
            prop_assert_eq!(lru.len(), model.order.len());
        }

        let expected: Vec<String> = model.order.iter().map(|(k, _)| k.clone()).collect();
        prop_assert_eq!(lru.keys(), expected);
        prop_assert_eq!(evicted.lock().clone(), model.evicted.clone());
    }
}
