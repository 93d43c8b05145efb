//! Group Statistics
//!
//! Lock-free counters updated on the lookup path and snapshotted for the
//! metrics exporter and the `/stats` endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::CacheStats;

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Increment by 1
    #[inline]
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current value
    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Per-group counters
#[derive(Debug, Default)]
pub struct GroupStats {
    /// Any `get` request, including those from peers
    pub gets: Counter,
    /// Answered from the main cache
    pub cache_hits: Counter,
    /// Values served by a remote peer
    pub peer_loads: Counter,
    /// Remote fetches that failed and fell back to the loader
    pub peer_errors: Counter,
    /// Lookups that missed the cache (before coalescing)
    pub loads: Counter,
    /// Loads actually executed (after coalescing)
    pub loads_deduped: Counter,
    /// Successful loader calls
    pub local_loads: Counter,
    /// Failed loader calls
    pub local_load_errs: Counter,
    /// Requests received from peers over the transport
    pub server_requests: Counter,
}

impl GroupStats {
    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            gets: self.gets.get(),
            cache_hits: self.cache_hits.get(),
            peer_loads: self.peer_loads.get(),
            peer_errors: self.peer_errors.get(),
            loads: self.loads.get(),
            loads_deduped: self.loads_deduped.get(),
            local_loads: self.local_loads.get(),
            local_load_errs: self.local_load_errs.get(),
            server_requests: self.server_requests.get(),
        }
    }
}

/// Serializable copy of [`GroupStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupStatsSnapshot {
    pub gets: u64,
    pub cache_hits: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub loads: u64,
    pub loads_deduped: u64,
    pub local_loads: u64,
    pub local_load_errs: u64,
    pub server_requests: u64,
}

/// Group counters together with its main-cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    /// Group name
    pub name: String,
    /// Lookup counters
    pub stats: GroupStatsSnapshot,
    /// Main cache counters
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = GroupStats::default();
        stats.gets.inc();
        stats.gets.inc();
        stats.peer_errors.inc();

        let snap = stats.snapshot();
        assert_eq!(snap.gets, 2);
        assert_eq!(snap.peer_errors, 1);
        assert_eq!(snap.local_loads, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = GroupSnapshot {
            name: "scores".into(),
            stats: GroupStatsSnapshot::default(),
            cache: CacheStats::default(),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["name"], "scores");
        assert_eq!(json["stats"]["gets"], 0);
        assert_eq!(json["cache"]["evictions"], 0);
    }
}
