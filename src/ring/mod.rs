//! Consistent Hash Ring
//!
//! Maps keys onto a set of peers so that adding or removing one peer only
//! remaps roughly `1 / peers` of the keyspace.
//!
//! # Design
//!
//! ```text
//!                 hash("0"+"A")
//!                      │
//!          ┌───────────●───────────┐
//!          │                       │
//!   hash("1"+"B") ●          ● hash("0"+"B")
//!          │                       │
//!          └─────●───────────●─────┘
//!        hash("1"+"A")   hash(key) ──► next position clockwise
//! ```
//!
//! - Each peer gets `replicas` virtual positions: `hash(i.to_string() + peer)`
//! - Lookup is a binary search for the first position `>= hash(key)`,
//!   wrapping to the start of the ring
//! - The hash is pluggable; the default is CRC-32 (IEEE)

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Hash function mapping bytes onto the ring
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Default virtual nodes per peer
pub const DEFAULT_REPLICAS: usize = 50;

/// Default ring hash (CRC-32 IEEE)
pub fn crc32_hash(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Virtual nodes sorted by `(position, peer)`. Two peers may share a
/// position; each keeps its own entry and the lower peer id wins lookups.
#[derive(Default)]
struct RingState {
    nodes: Vec<(u32, String)>,
}

/// Consistent hash ring with virtual nodes
pub struct HashRing {
    /// Virtual nodes per peer
    replicas: usize,
    /// Hash function
    hash: HashFn,
    /// Ring contents; writers hold the lock for the whole mutation
    state: RwLock<RingState>,
}

impl HashRing {
    /// Create a ring with the default CRC-32 hash
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, Arc::new(crc32_hash))
    }

    /// Create a ring with a custom hash function
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            replicas,
            hash,
            state: RwLock::new(RingState::default()),
        }
    }

    /// Virtual position of replica `index` of `peer`
    fn virtual_hash(&self, index: usize, peer: &str) -> u32 {
        (self.hash)(format!("{}{}", index, peer).as_bytes())
    }

    /// Add peers to the ring.
    ///
    /// Adding a peer that is already present duplicates its virtual nodes;
    /// callers track membership and add each peer once.
    pub fn add<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.write();
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let position = self.virtual_hash(i, peer);
                state.nodes.push((position, peer.to_string()));
            }
        }
        state.nodes.sort_unstable();
    }

    /// Remove a peer's virtual nodes from the ring; other peers' nodes at
    /// the same positions stay
    pub fn remove(&self, peer: &str) {
        self.state.write().nodes.retain(|(_, owner)| owner != peer);
    }

    /// Peer owning `key`, or `None` if the ring is empty
    pub fn get(&self, key: &str) -> Option<String> {
        let state = self.state.read();
        if state.nodes.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = state.nodes.partition_point(|(position, _)| *position < hash);
        let (_, owner) = &state.nodes[idx % state.nodes.len()];
        Some(owner.clone())
    }

    /// Number of virtual nodes on the ring
    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Check if the ring has no nodes
    pub fn is_empty(&self) -> bool {
        self.state.read().nodes.is_empty()
    }

    /// Virtual nodes per peer
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Distinct peers currently on the ring, sorted
    pub fn peers(&self) -> Vec<String> {
        let state = self.state.read();
        state
            .nodes
            .iter()
            .map(|(_, owner)| owner.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl fmt::Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("nodes", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Hash that reads the bytes as a decimal number, so positions are predictable.
    fn numeric_ring(replicas: usize) -> HashRing {
        HashRing::with_hasher(
            replicas,
            Arc::new(|key: &[u8]| {
                std::str::from_utf8(key)
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
                    .unwrap_or(0)
            }),
        )
    }

    #[test]
    fn test_hashing_with_virtual_nodes() {
        let ring = numeric_ring(3);

        // Positions: 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.add(["6", "4", "2"]);

        let mut cases: HashMap<&str, &str> =
            [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")].into_iter().collect();
        for (key, peer) in &cases {
            assert_eq!(ring.get(key).as_deref(), Some(*peer), "key {}", key);
        }

        // Adds 8, 18, 28
        ring.add(["8"]);
        cases.insert("27", "8");
        for (key, peer) in &cases {
            assert_eq!(ring.get(key).as_deref(), Some(*peer), "key {}", key);
        }
    }

    #[test]
    fn test_remove_only_remaps_removed_peer() {
        let ring = numeric_ring(3);
        ring.add(["6", "4", "2"]);
        assert_eq!(ring.len(), 9);

        let keys: Vec<String> = (0..30).map(|i| i.to_string()).collect();
        let before: Vec<_> = keys.iter().map(|k| ring.get(k)).collect();

        ring.remove("4");
        assert_eq!(ring.len(), 6);
        assert_eq!(ring.peers(), vec!["2".to_string(), "6".to_string()]);

        for (key, old) in keys.iter().zip(before) {
            let new = ring.get(key);
            if old.as_deref() == Some("4") {
                assert_ne!(new.as_deref(), Some("4"), "key {}", key);
            } else {
                assert_eq!(new, old, "key {}", key);
            }
        }

        // 23 used to land on 24 ("4"); now on 26 ("6")
        assert_eq!(ring.get("23").as_deref(), Some("6"));
    }

    #[test]
    fn test_colliding_positions_keep_both_owners() {
        // "01" and "1" both hash to position 1
        let ring = numeric_ring(1);
        ring.add(["1", "01"]);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.peers(), vec!["01".to_string(), "1".to_string()]);
        assert_eq!(ring.get("5").as_deref(), Some("01"));

        ring.remove("01");
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.peers(), vec!["1".to_string()]);
        assert_eq!(ring.get("5").as_deref(), Some("1"));

        ring.remove("1");
        assert!(ring.is_empty());
        assert_eq!(ring.get("5"), None);
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::default();
        assert!(ring.is_empty());
        assert_eq!(ring.get("anything"), None);
        assert_eq!(ring.replicas(), DEFAULT_REPLICAS);
    }

    #[test]
    fn test_remove_unknown_peer_is_noop() {
        let ring = numeric_ring(3);
        ring.add(["2"]);
        ring.remove("9");
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.get("5").as_deref(), Some("2"));
    }

    #[test]
    fn test_default_hash_is_crc32() {
        assert_eq!(crc32_hash(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32_hash(b""), 0);
    }

    #[test]
    fn test_crc32_ring_is_deterministic_and_balanced() {
        let peers = ["http://10.0.0.1:8001", "http://10.0.0.2:8001", "http://10.0.0.3:8001"];
        let a = HashRing::new(DEFAULT_REPLICAS);
        let b = HashRing::new(DEFAULT_REPLICAS);
        a.add(peers);
        b.add(peers.iter().rev());

        let mut counts: HashMap<String, usize> = HashMap::new();
        for i in 0..3000 {
            let key = format!("key-{}", i);
            let owner = a.get(&key).unwrap();
            assert_eq!(Some(owner.clone()), b.get(&key));
            *counts.entry(owner).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        for count in counts.values() {
            assert!(*count > 100, "unbalanced ring: {:?}", counts);
        }
    }

    #[test]
    fn test_adding_peer_moves_bounded_share() {
        let ring = HashRing::new(DEFAULT_REPLICAS);
        ring.add(["a", "b", "c", "d"]);
        let keys: Vec<String> = (0..4000).map(|i| format!("key-{}", i)).collect();
        let before: Vec<_> = keys.iter().map(|k| ring.get(k)).collect();

        ring.add(["e"]);
        let moved = keys
            .iter()
            .zip(&before)
            .filter(|(k, old)| ring.get(k) != **old)
            .count();

        // Ideal share is 1/5; allow generous slack for hash variance
        assert!(moved < keys.len() / 2, "moved {} of {}", moved, keys.len());
        for (k, old) in keys.iter().zip(&before) {
            let new = ring.get(k);
            assert!(new == *old || new.as_deref() == Some("e"));
        }
    }
}
