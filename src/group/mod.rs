//! Cache Groups
//!
//! A group is a named cache namespace: one byte-bounded main cache, one
//! loader for the source of truth, optional peer routing, and a flight
//! coordinator so each missing key is fetched once no matter how many
//! callers ask for it at the same time.
//!
//! # Lookup flow
//!
//! ```text
//!   get(key)
//!     │
//!     ├─ key == ""  ───────────────────────────────► InvalidArgument
//!     ├─ main cache hit ───────────────────────────► value
//!     └─ miss ─► Flight::run(key)
//!                  ├─ peer picked? ─► fetch ─ ok ──► value (fill per PeerFillPolicy)
//!                  │                     └ err ──► warn, fall through
//!                  └─ loader(key) ─ ok ─► populate main cache ─► value
//!                                  └ err ─────────────────────► loader error
//! ```

mod registry;
mod stats;

pub use registry::GroupRegistry;
pub use stats::{Counter, GroupSnapshot, GroupStats, GroupStatsSnapshot};

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::cache::{ByteView, MainCache, DEFAULT_CACHE_BYTES};
use crate::error::{Error, Result};
use crate::flight::Flight;
use crate::peers::{PeerGetter, PeerPicker};

// =============================================================================
// Loader
// =============================================================================

/// Loads a value from the source of truth when no cache has it.
///
/// Must be safe to call concurrently for different keys. Report a missing
/// key with [`Error::NotFound`].
#[async_trait]
pub trait Getter: Send + Sync {
    /// Load the value for `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Adapts an async closure into a [`Getter`].
pub struct GetterFn<F>(F);

impl<F> GetterFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Getter for GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<u8>>> + Send + 'static,
{
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        (self.0)(key.to_string()).await
    }
}

// =============================================================================
// Options
// =============================================================================

/// Whether values fetched from a peer are also kept in the local cache.
///
/// `Skip` keeps each value on its owning peer only, saving memory at the
/// cost of a remote round-trip per lookup. `Populate` trades memory for
/// fewer round-trips on hot keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PeerFillPolicy {
    #[default]
    Skip,
    Populate,
}

/// Group behavior knobs
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    /// Deadline for one loader call (None = unbounded)
    pub load_timeout: Option<Duration>,
    /// Deadline for one remote fetch (None = transport default)
    pub peer_timeout: Option<Duration>,
    /// Peer-fetched value handling
    pub peer_fill: PeerFillPolicy,
}

/// Builder for [`Group`]
pub struct GroupBuilder {
    name: String,
    cache_bytes: usize,
    getter: Option<Arc<dyn Getter>>,
    options: GroupOptions,
}

impl GroupBuilder {
    /// Start a group named `name` with the default cache budget
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache_bytes: DEFAULT_CACHE_BYTES,
            getter: None,
            options: GroupOptions::default(),
        }
    }

    /// Main cache budget in bytes (0 = unbounded)
    pub fn cache_bytes(mut self, cache_bytes: usize) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    /// Loader for cache misses
    pub fn getter(mut self, getter: impl Getter + 'static) -> Self {
        self.getter = Some(Arc::new(getter));
        self
    }

    /// Loader shared with other owners
    pub fn shared_getter(mut self, getter: Arc<dyn Getter>) -> Self {
        self.getter = Some(getter);
        self
    }

    /// Replace all options
    pub fn options(mut self, options: GroupOptions) -> Self {
        self.options = options;
        self
    }

    /// Deadline for each loader call
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.options.load_timeout = Some(timeout);
        self
    }

    /// Deadline for each remote fetch
    pub fn peer_timeout(mut self, timeout: Duration) -> Self {
        self.options.peer_timeout = Some(timeout);
        self
    }

    /// Peer-fetched value handling
    pub fn peer_fill(mut self, policy: PeerFillPolicy) -> Self {
        self.options.peer_fill = policy;
        self
    }

    /// Build the group; fails without a loader or a name
    pub fn build(self) -> Result<Group> {
        if self.name.is_empty() {
            return Err(Error::InvalidArgument("group name is required".into()));
        }
        let getter = self
            .getter
            .ok_or_else(|| Error::Misuse(format!("group {} has no loader", self.name)))?;

        Ok(Group {
            main_cache: MainCache::new(self.cache_bytes),
            name: self.name,
            getter,
            peers: OnceLock::new(),
            loader: Flight::new(),
            options: self.options,
            stats: GroupStats::default(),
        })
    }
}

// =============================================================================
// Group
// =============================================================================

/// Named cache namespace
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: MainCache,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    loader: Flight<ByteView>,
    options: GroupOptions,
    stats: GroupStats,
}

impl Group {
    /// Shortcut for `GroupBuilder::new(name).cache_bytes(..).getter(..).build()`
    pub fn new(name: impl Into<String>, cache_bytes: usize, getter: impl Getter + 'static) -> Result<Self> {
        GroupBuilder::new(name)
            .cache_bytes(cache_bytes)
            .getter(getter)
            .build()
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group options
    pub fn options(&self) -> &GroupOptions {
        &self.options
    }

    /// Install the peer picker.
    ///
    /// # Panics
    ///
    /// Panics if peers were already registered; that is a wiring bug.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) {
        if self.try_register_peers(peers).is_err() {
            panic!("register_peers called more than once for group {}", self.name);
        }
    }

    /// Install the peer picker, reporting double registration as an error
    pub fn try_register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(peers)
            .map_err(|_| Error::Misuse(format!("peers already registered for group {}", self.name)))
    }

    /// Look up `key`: main cache, then owning peer, then the loader.
    #[instrument(skip(self), fields(group = %self.name))]
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.stats.gets.inc();
        if key.is_empty() {
            return Err(Error::InvalidArgument("key is required".into()));
        }

        if let Some(value) = self.main_cache.get(key) {
            self.stats.cache_hits.inc();
            debug!("cache hit");
            return Ok(value);
        }

        self.load(key).await
    }

    /// [`get`](Self::get) bounded by a caller deadline.
    ///
    /// If this caller owned the in-flight load, callers coalesced onto it
    /// receive [`Error::FlightAbandoned`] when the deadline fires.
    pub async fn get_with_deadline(&self, key: &str, deadline: Duration) -> Result<ByteView> {
        with_deadline(key, Some(deadline), self.get(key)).await
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> GroupSnapshot {
        GroupSnapshot {
            name: self.name.clone(),
            stats: self.stats.snapshot(),
            cache: self.main_cache.stats(),
        }
    }

    /// Record a lookup served on behalf of a peer
    pub(crate) fn record_server_request(&self) {
        self.stats.server_requests.inc();
    }

    /// The group's main cache
    pub fn main_cache(&self) -> &MainCache {
        &self.main_cache
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.stats.loads.inc();
        self.loader
            .run(key, || async {
                // A load for this key may have finished between our miss and
                // taking ownership of the flight.
                if let Some(value) = self.main_cache.peek(key) {
                    self.stats.cache_hits.inc();
                    return Ok(value);
                }
                self.stats.loads_deduped.inc();

                if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
                    match self.get_from_peer(peer.as_ref(), key).await {
                        Ok(value) => {
                            self.stats.peer_loads.inc();
                            if self.options.peer_fill == PeerFillPolicy::Populate {
                                self.populate_cache(key, value.clone());
                            }
                            return Ok(value);
                        }
                        Err(e) => {
                            self.stats.peer_errors.inc();
                            warn!(
                                group = %self.name,
                                peer = %peer.peer_id(),
                                error = %e,
                                "Failed to get from peer, loading locally"
                            );
                        }
                    }
                }

                self.get_locally(key).await
            })
            .await
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        debug!(peer = %peer.peer_id(), "fetching from peer");
        let bytes = with_deadline(key, self.options.peer_timeout, peer.fetch(&self.name, key)).await?;
        Ok(ByteView::from(bytes))
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = match with_deadline(key, self.options.load_timeout, self.getter.get(key)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.local_load_errs.inc();
                debug!(error = %e, "loader failed");
                return Err(e);
            }
        };
        self.stats.local_loads.inc();

        let value = ByteView::from(bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.put(key, value);
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("main_cache", &self.main_cache)
            .field("peers_registered", &self.peers.get().is_some())
            .field("options", &self.options)
            .finish()
    }
}

async fn with_deadline<T, F>(key: &str, limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| Error::Timeout {
                key: key.to_string(),
                after,
            })?,
        None => fut.await,
    }
}

// =============================================================================
// Tests
// =============================================================================
