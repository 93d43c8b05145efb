//! Metrics module
//!
//! Exposes per-group cache statistics in the Prometheus text format. Group
//! counters live in the groups themselves; on every scrape the exporter
//! advances its counters to the latest snapshot and sets the size gauges.

mod server;

pub use server::run_admin_server;

use parking_lot::Mutex;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{Error, Result};
use crate::group::{GroupRegistry, GroupSnapshot};

/// Metric namespace
const NAMESPACE: &str = "peercache";

/// Prometheus exporter for group statistics
pub struct GroupMetrics {
    registry: Registry,
    /// Serializes refreshes so concurrent scrapes never add a delta twice
    refresh_lock: Mutex<()>,
    gets: IntCounterVec,
    cache_hits: IntCounterVec,
    peer_loads: IntCounterVec,
    peer_errors: IntCounterVec,
    loads: IntCounterVec,
    loads_deduped: IntCounterVec,
    local_loads: IntCounterVec,
    local_load_errors: IntCounterVec,
    server_requests: IntCounterVec,
    cache_evictions: IntCounterVec,
    cache_bytes: IntGaugeVec,
    cache_items: IntGaugeVec,
}

impl GroupMetrics {
    /// Create the metrics on a private registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> Result<IntCounterVec> {
            let vec = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])
                .map_err(metrics_error)?;
            registry.register(Box::new(vec.clone())).map_err(metrics_error)?;
            Ok(vec)
        };
        let gauge = |name: &str, help: &str| -> Result<IntGaugeVec> {
            let vec = IntGaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])
                .map_err(metrics_error)?;
            registry.register(Box::new(vec.clone())).map_err(metrics_error)?;
            Ok(vec)
        };

        Ok(Self {
            refresh_lock: Mutex::new(()),
            gets: counter("gets_total", "Lookups received, including peer requests")?,
            cache_hits: counter("cache_hits_total", "Lookups answered from the main cache")?,
            peer_loads: counter("peer_loads_total", "Values served by a remote peer")?,
            peer_errors: counter("peer_errors_total", "Failed remote fetches")?,
            loads: counter("loads_total", "Lookups that missed the main cache")?,
            loads_deduped: counter("loads_deduped_total", "Loads executed after coalescing")?,
            local_loads: counter("local_loads_total", "Successful loader calls")?,
            local_load_errors: counter("local_load_errors_total", "Failed loader calls")?,
            server_requests: counter("server_requests_total", "Requests received from peers")?,
            cache_evictions: counter("cache_evictions_total", "Entries evicted from the main cache")?,
            cache_bytes: gauge("cache_bytes", "Bytes held by the main cache")?,
            cache_items: gauge("cache_items", "Entries held by the main cache")?,
            registry,
        })
    }

    /// Bring the metrics of every group up to date
    pub fn refresh(&self, groups: &GroupRegistry) {
        let _guard = self.refresh_lock.lock();
        for group in groups.groups() {
            self.observe(&group.stats());
        }
    }

    fn observe(&self, snap: &GroupSnapshot) {
        let label = [snap.name.as_str()];
        let advance = |vec: &IntCounterVec, total: u64| {
            let counter = vec.with_label_values(&label[..]);
            counter.inc_by(total.saturating_sub(counter.get()));
        };
        let set = |vec: &IntGaugeVec, value: u64| {
            vec.with_label_values(&label[..]).set(value.min(i64::MAX as u64) as i64);
        };

        advance(&self.gets, snap.stats.gets);
        advance(&self.cache_hits, snap.stats.cache_hits);
        advance(&self.peer_loads, snap.stats.peer_loads);
        advance(&self.peer_errors, snap.stats.peer_errors);
        advance(&self.loads, snap.stats.loads);
        advance(&self.loads_deduped, snap.stats.loads_deduped);
        advance(&self.local_loads, snap.stats.local_loads);
        advance(&self.local_load_errors, snap.stats.local_load_errs);
        advance(&self.server_requests, snap.stats.server_requests);
        advance(&self.cache_evictions, snap.cache.evictions);
        set(&self.cache_bytes, snap.cache.bytes);
        set(&self.cache_items, snap.cache.items);
    }

    /// Refresh and render in the Prometheus text format
    pub fn render(&self, groups: &GroupRegistry) -> Result<(String, Vec<u8>)> {
        self.refresh(groups);
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}

impl std::fmt::Debug for GroupMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupMetrics").finish_non_exhaustive()
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}
