//! HTTP Peer Pool
//!
//! Owns the hash ring and one [`HttpGetter`] per peer. Membership changes
//! build or mutate the routing state under a write lock; `pick_peer` takes
//! a read lock for one ring lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use tracing::{debug, info};

use super::{normalize_url, HttpGetter, DEFAULT_BASE_PATH};
use crate::error::{Error, Result};
use crate::peers::{PeerGetter, PeerPicker};
use crate::ring::{HashFn, HashRing, DEFAULT_REPLICAS};

/// Pool configuration
#[derive(Clone)]
pub struct PoolOptions {
    /// Virtual nodes per peer
    pub replicas: usize,
    /// URL prefix for peer requests
    pub base_path: String,
    /// Per-request timeout for remote fetches
    pub timeout: Duration,
    /// Ring hash (None = CRC-32)
    pub hash: Option<HashFn>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_REPLICAS,
            base_path: DEFAULT_BASE_PATH.to_string(),
            timeout: Duration::from_secs(5),
            hash: None,
        }
    }
}

impl std::fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolOptions")
            .field("replicas", &self.replicas)
            .field("base_path", &self.base_path)
            .field("timeout", &self.timeout)
            .field("custom_hash", &self.hash.is_some())
            .finish()
    }
}

struct PoolState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// Peer picker backed by a consistent hash ring of HTTP peers
pub struct HttpPool {
    /// This process's own base URL
    self_url: String,
    options: PoolOptions,
    client: Client,
    state: RwLock<PoolState>,
}

impl HttpPool {
    /// Create a pool for the process reachable at `self_url`
    pub fn new(self_url: &str, options: PoolOptions) -> Result<Self> {
        if options.replicas == 0 {
            return Err(Error::Config("pool replicas must be at least 1".into()));
        }
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let state = RwLock::new(PoolState {
            ring: Self::empty_ring(&options),
            getters: HashMap::new(),
        });

        Ok(Self {
            self_url: normalize_url(self_url),
            options,
            client,
            state,
        })
    }

    /// This process's base URL
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Replace the whole peer set.
    ///
    /// The new ring and getter table are built off-lock and swapped in
    /// together, so lookups see either the old set or the new one.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut urls: Vec<String> = peers.into_iter().map(|p| normalize_url(p.as_ref())).collect();
        urls.sort();
        urls.dedup();

        let ring = Self::empty_ring(&self.options);
        ring.add(&urls);
        let getters = urls
            .iter()
            .map(|url| (url.clone(), Arc::new(self.getter_for(url))))
            .collect();

        *self.state.write() = PoolState { ring, getters };
        info!(peers = ?urls, "Peer set updated");
    }

    /// Add one peer; no-op if already present
    pub fn add_peer(&self, peer: &str) {
        let url = normalize_url(peer);
        let mut state = self.state.write();
        if state.getters.contains_key(&url) {
            return;
        }
        state.ring.add([url.as_str()]);
        let getter = Arc::new(self.getter_for(&url));
        state.getters.insert(url.clone(), getter);
        info!(peer = %url, "Peer joined");
    }

    /// Remove one peer; no-op if absent
    pub fn remove_peer(&self, peer: &str) {
        let url = normalize_url(peer);
        let mut state = self.state.write();
        if state.getters.remove(&url).is_none() {
            return;
        }
        state.ring.remove(&url);
        info!(peer = %url, "Peer left");
    }

    /// Current peers, sorted
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.state.read().getters.keys().cloned().collect();
        peers.sort();
        peers
    }

    fn empty_ring(options: &PoolOptions) -> HashRing {
        match &options.hash {
            Some(hash) => HashRing::with_hasher(options.replicas, Arc::clone(hash)),
            None => HashRing::new(options.replicas),
        }
    }

    fn getter_for(&self, url: &str) -> HttpGetter {
        HttpGetter::with_client(url, &self.options.base_path, self.client.clone())
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let owner = state.ring.get(key)?;
        if owner == self.self_url {
            return None;
        }
        debug!(key, peer = %owner, "Pick peer");
        state
            .getters
            .get(&owner)
            .map(|getter| Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("options", &self.options)
            .field("peers", &self.peers())
            .finish()
    }
}
