//! Peer Ports
//!
//! Abstractions a [`Group`](crate::group::Group) depends on to reach other
//! cache processes. The transport layer ([`crate::transport`]) provides the
//! HTTP adapters; tests plug in in-memory fakes.
//!
//! ```text
//! ┌───────────────┐  pick_peer(key)  ┌──────────────┐  fetch(group, key)  ┌──────────┐
//! │     Group     │ ───────────────► │  PeerPicker  │ ──────────────────► │PeerGetter│
//! └───────────────┘                  │ (hash ring)  │                     │ (remote) │
//!                                    └──────────────┘                     └──────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Locates the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Peer owning `key`, or `None` when the key should be loaded locally
    /// (no peers, or this process is the owner).
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Fetches values from one remote peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Identifier used in logs and errors (usually the peer's base URL)
    fn peer_id(&self) -> &str;

    /// Fetch `key` of group `group` from the peer
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes>;
}

/// Picker that never selects a peer; every load stays local.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeers;

impl PeerPicker for NoPeers {
    fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_peers_never_picks() {
        assert!(NoPeers.pick_peer("any").is_none());
        assert!(NoPeers.pick_peer("").is_none());
    }
}
