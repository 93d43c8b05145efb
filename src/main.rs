//! peercache node
//!
//! Runs one cache node: serves its groups to peers over HTTP, routes misses
//! to the owning peer, and exposes metrics/health/stats on an admin port.
//!
//! # Architecture
//!
//! ```text
//!            ┌───────────────────────── node ─────────────────────────┐
//!  peers ───▶│ PeerServer ──▶ GroupRegistry ──▶ Group ──▶ FileSource  │
//!            │                                   │                    │
//!            │                                   └──▶ HttpPool ───────┼──▶ peers
//!  scrape ──▶│ Admin server (/metrics, /healthz, /stats)              │
//!            └────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peercache::config::{GroupSpec, NodeConfig};
use peercache::error::{Error, Result};
use peercache::metrics::{run_admin_server, GroupMetrics};
use peercache::{GroupRegistry, HttpPool, PeerPicker, PeerServer};

// =============================================================================
// CLI Arguments
// =============================================================================

/// peercache - peer-aware distributed cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "PEERCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Peer server bind address
    #[arg(long, env = "PEERCACHE_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// URL other peers use to reach this node
    #[arg(long, env = "PEERCACHE_SELF_URL")]
    self_url: Option<String>,

    /// Comma-separated peer URLs, this node included
    #[arg(long, env = "PEERCACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Virtual nodes per peer
    #[arg(long, env = "PEERCACHE_REPLICAS")]
    replicas: Option<usize>,

    /// Admin server bind address (metrics, health, stats)
    #[arg(long, env = "PEERCACHE_METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Group served from a directory, as NAME=DIR (repeatable)
    #[arg(long = "group", env = "PEERCACHE_GROUPS", value_delimiter = ',')]
    groups: Vec<String>,

    /// Cache budget in bytes for groups given with --group
    #[arg(long, env = "PEERCACHE_CACHE_BYTES", default_value = "67108864")]
    cache_bytes: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PEERCACHE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "PEERCACHE_LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = build_config(&args)?;
    let self_url = config.self_url();

    info!("Starting peercache node");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Self URL: {}", self_url);
    info!("  Peers: {:?}", config.peers);
    info!("  Groups: {}", config.groups.len());

    // Peer routing
    let pool = Arc::new(HttpPool::new(&self_url, config.pool_options())?);
    pool.set_peers(&config.peers);

    // Groups
    let groups = Arc::new(GroupRegistry::new());
    for spec in &config.groups {
        let group = groups.register(spec.builder())?;
        group.try_register_peers(Arc::clone(&pool) as Arc<dyn PeerPicker>)?;
        info!(
            group = %spec.name,
            cache_bytes = spec.cache_bytes,
            data_dir = %spec.data_dir.display(),
            "Group ready"
        );
    }

    let shutdown = CancellationToken::new();

    // Start admin server
    if let Some(addr) = config.metrics_socket()? {
        let metrics = Arc::new(GroupMetrics::new()?);
        let groups = Arc::clone(&groups);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = run_admin_server(addr, groups, metrics, shutdown).await {
                error!("Admin server error: {}", e);
            }
        });
    }

    // Stop on Ctrl-C
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
            shutdown.cancel();
        });
    }

    // Run the peer server
    let server = PeerServer::bind(config.server_config()?, groups).await?;
    server.serve(shutdown).await?;

    info!("Node shutdown complete");
    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

/// YAML file (if any) overlaid with command-line/env values
fn build_config(args: &Args) -> Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };

    if let Some(addr) = &args.listen_addr {
        config.listen_addr = addr.clone();
    }
    if let Some(url) = &args.self_url {
        config.self_url = Some(url.clone());
    }
    if !args.peers.is_empty() {
        config.peers = args.peers.clone();
    }
    if let Some(replicas) = args.replicas {
        config.replicas = replicas;
    }
    if let Some(addr) = &args.metrics_addr {
        config.metrics_addr = Some(addr.clone());
    }
    for group in &args.groups {
        let (name, dir) = group
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("--group expects NAME=DIR, got {:?}", group)))?;
        config.groups.push(GroupSpec {
            name: name.to_string(),
            cache_bytes: args.cache_bytes,
            data_dir: PathBuf::from(dir),
            populate_from_peers: false,
            load_timeout_ms: None,
        });
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = ["hyper=warn", "reqwest=warn"]
        .into_iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(level.into()),
            |filter, directive| filter.add_directive(directive),
        );

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
