//! Local Cache Layer
//!
//! Byte-bounded LRU storage backing every group.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      MainCache                           │
//! │         (Mutex + hit / miss / eviction counters)         │
//! ├──────────────────────────────────────────────────────────┤
//! │                 LruCache<ByteView>                       │
//! │   slot-linked recency list  +  HashMap<String, slot>     │
//! │   budget: Σ len(key) + len(value)   (0 = unbounded)      │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod byteview;
mod lru;
mod proptest;
mod store;

pub use byteview::{ByteSize, ByteView};
pub use lru::{EvictionCallback, LruCache};
pub use store::{CacheStats, MainCache};

/// Default per-group cache budget (64MB)
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;
