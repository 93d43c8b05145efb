//! HTTP Peer Transport
//!
//! Concrete peer capabilities over plain HTTP/1:
//!
//! - [`HttpGetter`] fetches `GET {base_path}{group}/{key}` from one peer
//! - [`HttpPool`] routes keys to peers over a [`HashRing`](crate::ring::HashRing)
//! - [`PeerServer`] answers those requests from a [`GroupRegistry`](crate::group::GroupRegistry)
//!
//! Group and key segments are percent-encoded, so keys may contain `/`.

mod client;
mod pool;
mod server;

pub use client::HttpGetter;
pub use pool::{HttpPool, PoolOptions};
pub use server::{route, PeerServer, ServerConfig};

/// Default URL prefix for peer requests
pub const DEFAULT_BASE_PATH: &str = "/_peercache/";

/// Trim trailing slashes so `http://a:1/` and `http://a:1` name the same peer
pub(crate) fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Ensure a base path starts and ends with `/`
pub(crate) fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
