//! HTTP Peer Client

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, instrument};

use super::{normalize_base_path, normalize_url};
use crate::error::{Error, Result};
use crate::peers::PeerGetter;

/// Fetches values from one peer over HTTP
#[derive(Debug, Clone)]
pub struct HttpGetter {
    /// Peer base URL (no trailing slash), used as the peer id
    peer: String,
    /// `{peer}{base_path}`
    prefix: String,
    client: Client,
}

impl HttpGetter {
    /// Create a getter with its own client
    pub fn new(peer_url: &str, base_path: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(peer_url, base_path, client))
    }

    /// Create a getter sharing an existing connection pool
    pub fn with_client(peer_url: &str, base_path: &str, client: Client) -> Self {
        let peer = normalize_url(peer_url);
        let prefix = format!("{}{}", peer, normalize_base_path(base_path));
        Self {
            peer,
            prefix,
            client,
        }
    }

    /// Request URL for `key` of `group`
    pub fn url(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.prefix,
            urlencoding::encode(group),
            urlencoding::encode(key)
        )
    }

    fn remote_error(&self, reason: impl Into<String>) -> Error {
        Error::RemoteFetch {
            peer: self.peer.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    fn peer_id(&self) -> &str {
        &self.peer
    }

    #[instrument(skip(self), fields(peer = %self.peer))]
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
        let url = self.url(group, key);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.remote_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(self.remote_error(format!("server returned: {}", response.status())));
        }

        response
            .bytes()
            .await
            .map_err(|e| self.remote_error(format!("reading response body: {}", e)))
    }
}
