//! Node Configuration
//!
//! YAML-backed description of one cache node: where it listens, which peers
//! form the ring, and which groups it serves. Command-line flags in the
//! binary override individual fields after loading.
//!
//! ```yaml
//! listen_addr: 0.0.0.0:8001
//! self_url: http://10.0.0.1:8001
//! peers: [http://10.0.0.1:8001, http://10.0.0.2:8001]
//! metrics_addr: 0.0.0.0:9090
//! groups:
//!   - name: scores
//!     cache_bytes: 2048
//!     data_dir: /var/lib/peercache/scores
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_BYTES;
use crate::error::{Error, Result};
use crate::group::{GroupBuilder, PeerFillPolicy};
use crate::ring::DEFAULT_REPLICAS;
use crate::source::FileSource;
use crate::transport::{PoolOptions, ServerConfig, DEFAULT_BASE_PATH};

/// Configuration of one cache node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// Peer server bind address
    pub listen_addr: String,
    /// URL other peers use to reach this node (default: `http://{listen_addr}`)
    pub self_url: Option<String>,
    /// Every ring member, this node included
    pub peers: Vec<String>,
    /// Virtual nodes per peer
    pub replicas: usize,
    /// URL prefix for peer requests
    pub base_path: String,
    /// Remote fetch timeout in milliseconds
    pub peer_timeout_ms: u64,
    /// Admin (metrics/health/stats) bind address; disabled when unset
    pub metrics_addr: Option<String>,
    /// Groups served by this node
    pub groups: Vec<GroupSpec>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8001".to_string(),
            self_url: None,
            peers: Vec::new(),
            replicas: DEFAULT_REPLICAS,
            base_path: DEFAULT_BASE_PATH.to_string(),
            peer_timeout_ms: 5_000,
            metrics_addr: None,
            groups: Vec::new(),
        }
    }
}

/// One group served by the node, backed by a directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default = "default_cache_bytes")]
    pub cache_bytes: usize,
    /// One file per key
    pub data_dir: PathBuf,
    /// Keep peer-fetched values in the local cache too
    #[serde(default)]
    pub populate_from_peers: bool,
    /// Loader deadline in milliseconds
    #[serde(default)]
    pub load_timeout_ms: Option<u64>,
}

fn default_cache_bytes() -> usize {
    DEFAULT_CACHE_BYTES
}

impl NodeConfig {
    /// Read and validate a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// Parse and validate YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.listen_socket()?;
        if let Some(addr) = &self.metrics_addr {
            parse_addr("metrics_addr", addr)?;
        }
        if self.replicas == 0 {
            return Err(Error::Config("replicas must be at least 1".into()));
        }
        if self.peer_timeout_ms == 0 {
            return Err(Error::Config("peer_timeout_ms must be positive".into()));
        }
        if let Some(peer) = self.peers.iter().find(|p| !is_http_url(p)) {
            return Err(Error::Config(format!("peer {} is not an http(s) URL", peer)));
        }
        if let Some(url) = &self.self_url {
            if !is_http_url(url) {
                return Err(Error::Config(format!("self_url {} is not an http(s) URL", url)));
            }
        }

        let mut names = std::collections::HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(Error::Config("group name must not be empty".into()));
            }
            if !names.insert(group.name.as_str()) {
                return Err(Error::Config(format!("group {} is declared twice", group.name)));
            }
        }
        Ok(())
    }

    /// Parsed peer server address
    pub fn listen_socket(&self) -> Result<SocketAddr> {
        parse_addr("listen_addr", &self.listen_addr)
    }

    /// Parsed admin server address, if enabled
    pub fn metrics_socket(&self) -> Result<Option<SocketAddr>> {
        self.metrics_addr
            .as_deref()
            .map(|addr| parse_addr("metrics_addr", addr))
            .transpose()
    }

    /// URL other peers use to reach this node
    pub fn self_url(&self) -> String {
        self.self_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.listen_addr))
    }

    /// Options for the peer pool
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            replicas: self.replicas,
            base_path: self.base_path.clone(),
            timeout: Duration::from_millis(self.peer_timeout_ms),
            hash: None,
        }
    }

    /// Options for the peer server
    pub fn server_config(&self) -> Result<ServerConfig> {
        Ok(ServerConfig {
            addr: self.listen_socket()?,
            base_path: self.base_path.clone(),
        })
    }
}

impl GroupSpec {
    /// Builder for a file-backed group
    pub fn builder(&self) -> GroupBuilder {
        let mut builder = GroupBuilder::new(self.name.clone())
            .cache_bytes(self.cache_bytes)
            .getter(FileSource::new(self.data_dir.clone()));
        if self.populate_from_peers {
            builder = builder.peer_fill(PeerFillPolicy::Populate);
        }
        if let Some(ms) = self.load_timeout_ms {
            builder = builder.load_timeout(Duration::from_millis(ms));
        }
        builder
    }
}

fn parse_addr(field: &str, addr: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|e| Error::Config(format!("{} {:?} is not a socket address: {}", field, addr, e)))
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SAMPLE: &str = r#"
listen_addr: 127.0.0.1:8001
peers:
  - http://127.0.0.1:8001
  - http://127.0.0.1:8002
metrics_addr: 127.0.0.1:9090
groups:
  - name: scores
    cache_bytes: 2048
    data_dir: /tmp/scores
    populate_from_peers: true
"#;

    #[test]
    fn test_parse_sample() {
        let config = NodeConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.listen_socket().unwrap(), "127.0.0.1:8001".parse().unwrap());
        assert_eq!(config.self_url(), "http://127.0.0.1:8001");
        assert_eq!(config.peers.len(), 2);
        assert_eq!(config.replicas, DEFAULT_REPLICAS);
        assert_eq!(config.base_path, DEFAULT_BASE_PATH);
        assert!(config.metrics_socket().unwrap().is_some());

        let group = &config.groups[0];
        assert_eq!(group.cache_bytes, 2048);
        assert!(group.populate_from_peers);
        assert_eq!(group.load_timeout_ms, None);

        let built = group.builder().build().unwrap();
        assert_eq!(built.name(), "scores");
        assert_eq!(built.options().peer_fill, PeerFillPolicy::Populate);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = NodeConfig::from_yaml("{}").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert!(config.metrics_socket().unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_values() {
        let cases = [
            "listen_addr: nowhere",
            "replicas: 0",
            "peers: [10.0.0.1:8001]",
            "metrics_addr: ':x'",
            "groups: [{name: a, data_dir: /a}, {name: a, data_dir: /b}]",
            "unknown_field: 1",
        ];
        for yaml in cases {
            assert_matches!(NodeConfig::from_yaml(yaml), Err(Error::Config(_)), "{}", yaml);
        }
    }

    #[test]
    fn test_pool_options_follow_config() {
        let config = NodeConfig {
            replicas: 7,
            peer_timeout_ms: 250,
            ..Default::default()
        };
        let options = config.pool_options();
        assert_eq!(options.replicas, 7);
        assert_eq!(options.timeout, Duration::from_millis(250));
    }
}
