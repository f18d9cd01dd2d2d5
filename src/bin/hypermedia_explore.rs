//! Hypermedia discovery CLI
//!
//! Walks a HAL or JSON:API service breadth-first from a seed URL and prints
//! the discovered resource graph as JSON.
//!
//! # Usage
//!
//! ```bash
//! hypermedia_explore http://localhost:3000/orders/1 --max-depth 3
//!
//! # Identify HAL resources through the service's own link templates
//! hypermedia_explore http://localhost:3000/orders/1 --registry config/link_registry.yaml
//!
//! # Services mounted under a prefix
//! hypermedia_explore http://localhost:3000/api/orders/1 --base-path /api
//! ```
//!
//! Ctrl-C stops the walk and prints the partial graph.

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hypermedia_engine::{
    cancel_pair, DiscoveryWalker, HttpFetcher, LinkRegistry, LinkRegistryConfig, PathSegmentKeys,
    WalkerConfig,
};

#[derive(Parser)]
#[command(name = "hypermedia_explore")]
#[command(version = "0.1.0")]
#[command(about = "Discover a resource graph from served hypermedia")]
struct Cli {
    /// URL to start the walk from
    seed: String,

    /// Deepest BFS level to fetch (the seed is depth 0)
    #[arg(long, env = "HYPERMEDIA_MAX_DEPTH", default_value_t = 3)]
    max_depth: usize,

    /// Fetches in flight per depth level
    #[arg(long, env = "HYPERMEDIA_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-request timeout
    #[arg(long, env = "HYPERMEDIA_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// Link registry YAML used to identify HAL resources
    #[arg(long, env = "HYPERMEDIA_REGISTRY")]
    registry: Option<PathBuf>,

    /// Path prefix to ignore when keying HAL resources by `/<type>/<id>`
    /// (e.g. `/api/v1`); unused with `--registry`
    #[arg(long, env = "HYPERMEDIA_BASE_PATH")]
    base_path: Option<String>,

    /// Include link edges resolved to resources in the output
    #[arg(long)]
    resolved: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hypermedia_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = WalkerConfig {
        max_depth: cli.max_depth,
        concurrency: cli.concurrency,
        request_timeout_secs: cli.timeout_secs,
    };
    let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))
        .context("Failed to build HTTP client")?;
    let mut walker = DiscoveryWalker::new(fetcher, config);

    if let Some(base_path) = &cli.base_path {
        walker = walker.with_key_extractor(Arc::new(PathSegmentKeys::with_base_path(base_path.as_str())));
    }
    if let Some(path) = &cli.registry {
        tracing::info!(path = %path.display(), "Loading link registry");
        let registry_config = LinkRegistryConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let registry = LinkRegistry::from_config(&registry_config)?;
        walker = walker.with_key_extractor(Arc::new(registry));
    }

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, returning partial graph");
            handle.cancel();
        }
    });

    let graph = walker.discover_until(&cli.seed, signal).await?;

    let output = if cli.resolved {
        json!({
            "graph": graph,
            "resolved_edges": graph.resolved_edges(),
        })
    } else {
        serde_json::to_value(&graph)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
