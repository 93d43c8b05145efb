//! peercache - Peer-Aware Distributed Cache
//!
//! An embeddable caching layer for read-heavy data. Each process keeps a
//! byte-bounded LRU cache per named group; on a miss it asks the peer that
//! owns the key (chosen by consistent hashing) before falling back to the
//! application's loader. Concurrent misses for one key share a single
//! upstream fetch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Group                                │
//! │  ┌────────────┐    ┌────────────┐    ┌────────────────────────┐  │
//! │  │ Main Cache │    │   Flight   │───▶│ PeerPicker → PeerGetter │  │
//! │  │   (LRU)    │    │ (coalesce) │───▶│ Getter (loader)         │  │
//! │  └────────────┘    └────────────┘    └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use peercache::{GetterFn, GroupRegistry};
//!
//! # async fn demo() -> peercache::Result<()> {
//! let groups = GroupRegistry::new();
//! let scores = groups.create_group(
//!     "scores",
//!     2 << 10,
//!     GetterFn::new(|key: String| async move { Ok(key.into_bytes()) }),
//! )?;
//! let value = scores.get("Tom").await?;
//! println!("{}", value);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Byte-bounded LRU and the thread-safe main cache
//! - [`ring`] - Consistent hash ring
//! - [`flight`] - Request coalescing
//! - [`group`] - Groups, loaders and the group registry
//! - [`peers`] - Peer selection and remote fetch traits
//! - [`transport`] - HTTP peer pool, client and server
//! - [`metrics`] - Prometheus exporter and admin endpoints
//! - [`config`] - Node configuration
//! - [`source`] - Directory-backed loader
//! - [`error`] - Error types

pub mod cache;
pub mod config;
pub mod error;
pub mod flight;
pub mod group;
pub mod metrics;
pub mod peers;
pub mod ring;
pub mod source;
pub mod transport;

// Re-export commonly used types
pub use cache::{ByteView, LruCache};
pub use error::{Error, Result};
pub use flight::Flight;
pub use group::{
    Getter, GetterFn, Group, GroupBuilder, GroupOptions, GroupRegistry, GroupSnapshot,
    PeerFillPolicy,
};
pub use peers::{NoPeers, PeerGetter, PeerPicker};
pub use ring::HashRing;
pub use source::FileSource;
pub use transport::{HttpGetter, HttpPool, PeerServer, PoolOptions, ServerConfig};
