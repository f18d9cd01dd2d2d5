//! Breadth-first discovery walker
//!
//! Reconstructs a resource graph from served hypermedia alone. The walker
//! processes one depth level at a time: every URL of the frontier is
//! fetched (up to `concurrency` in flight), results are merged in frontier
//! order, and only then does the next level start. A session-wide seen
//! set of normalised URLs plus the depth bound guarantee termination on
//! cyclic link graphs.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::WalkerConfig;
use crate::discovery::fetch::{Fetch, FetchedDocument};
use crate::discovery::graph::{
    DiscoveredGraph, FailureKind, FailureRecord, LinkEdge, NodeSnapshot,
};
use crate::discovery::keys::{KeyExtractor, PathSegmentKeys};
use crate::discovery::parse::{normalize_url, parse_document, ParsedDocument};
use crate::error::{DiscoveryError, FetchError};

/// Requests cancellation of a running traversal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by the walker before each fetch
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }
}

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
}

/// Outcome of one frontier slot; `None` when skipped or discarded after
/// cancellation
type FetchOutcome = Option<Result<FetchedDocument, FetchError>>;

pub struct DiscoveryWalker<F> {
    fetcher: F,
    config: WalkerConfig,
    keys: Arc<dyn KeyExtractor>,
}

impl<F: Fetch> DiscoveryWalker<F> {
    pub fn new(fetcher: F, config: WalkerConfig) -> Self {
        Self {
            fetcher,
            config,
            keys: Arc::new(PathSegmentKeys::new()),
        }
    }

    /// Replace the HAL identity strategy, e.g. with a `LinkRegistry`
    pub fn with_key_extractor(mut self, keys: Arc<dyn KeyExtractor>) -> Self {
        self.keys = keys;
        self
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    /// Run a traversal session to completion
    pub async fn discover(&self, seed: &str) -> Result<DiscoveredGraph, DiscoveryError> {
        self.discover_until(seed, CancelSignal::never()).await
    }

    /// Run a traversal session that stops early once `cancel` fires.
    ///
    /// Only an unparseable seed URL is an error. Fetch and format failures
    /// are recorded in the graph, and a cancelled session returns the
    /// partial graph with `is_cancelled()` set.
    pub async fn discover_until(
        &self,
        seed: &str,
        cancel: CancelSignal,
    ) -> Result<DiscoveredGraph, DiscoveryError> {
        let seed_url = Url::parse(seed).map_err(|e| DiscoveryError::InvalidUrl {
            url: seed.to_string(),
            reason: e.to_string(),
        })?;
        let seed_url = normalize_url(seed_url);

        info!(
            seed = %seed_url,
            max_depth = self.config.max_depth,
            concurrency = self.config.effective_concurrency(),
            "Starting discovery"
        );

        let mut graph = DiscoveredGraph::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(seed_url.to_string());
        let mut frontier = vec![seed_url];
        let mut depth = 0;

        while !frontier.is_empty() {
            if cancel.is_cancelled() {
                graph.mark_cancelled();
                break;
            }
            debug!(depth, urls = frontier.len(), "Fetching frontier");

            let outcomes = self.fetch_frontier(&frontier, &cancel).await;

            let mut next = Vec::new();
            for (url, outcome) in frontier.iter().zip(outcomes) {
                let Some(result) = outcome else {
                    continue;
                };
                self.absorb(&mut graph, &mut seen, &mut next, url, depth, result);
            }

            if cancel.is_cancelled() {
                graph.mark_cancelled();
                break;
            }
            frontier = next;
            depth += 1;
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edges().len(),
            failures = graph.failures().count(),
            cancelled = graph.is_cancelled(),
            "Discovery finished"
        );
        Ok(graph)
    }

    async fn fetch_frontier(&self, frontier: &[Url], cancel: &CancelSignal) -> Vec<FetchOutcome> {
        let fetcher = &self.fetcher;
        stream::iter(frontier.iter().map(|url| {
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let result = fetcher.fetch(url).await;
                if cancel.is_cancelled() {
                    debug!(url = %url, "Discarding fetch completed after cancellation");
                    return None;
                }
                Some(result)
            }
        }))
        .buffered(self.config.effective_concurrency())
        .collect()
        .await
    }

    fn absorb(
        &self,
        graph: &mut DiscoveredGraph,
        seen: &mut HashSet<String>,
        next: &mut Vec<Url>,
        url: &Url,
        depth: usize,
        result: Result<FetchedDocument, FetchError>,
    ) {
        graph.record_visit(url.as_str());

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(source) => {
                let err = DiscoveryError::Fetch {
                    url: url.to_string(),
                    source,
                };
                warn!(depth, error = %err, "Fetch failed, continuing");
                graph.record_failure(FailureRecord {
                    url: url.to_string(),
                    depth,
                    kind: FailureKind::FetchFailed,
                    message: err.to_string(),
                });
                return;
            }
        };

        let parsed = match parse_document(url, &fetched, self.keys.as_ref()) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(depth, error = %err, "Unparseable document, continuing");
                graph.record_failure(FailureRecord {
                    url: url.to_string(),
                    depth,
                    kind: FailureKind::Unparseable,
                    message: err.to_string(),
                });
                return;
            }
        };

        self.merge(graph, seen, next, url, depth, parsed);
    }

    fn merge(
        &self,
        graph: &mut DiscoveredGraph,
        seen: &mut HashSet<String>,
        next: &mut Vec<Url>,
        url: &Url,
        depth: usize,
        parsed: ParsedDocument,
    ) {
        let source_url = url.to_string();

        for node in parsed.nodes {
            // content of embedded and included resources has already arrived
            if node.complete {
                if let Some(self_url) = &node.self_url {
                    seen.insert(self_url.to_string());
                }
            }
            graph.upsert_node(
                NodeSnapshot {
                    key: node.key,
                    attributes: node.attributes,
                    format: parsed.format,
                    self_url: node.self_url.map(|u| u.to_string()),
                    source_url: source_url.clone(),
                    depth,
                },
                node.complete,
            );
        }

        if let Some(primary) = parsed.primary {
            graph.record_location(source_url.clone(), primary);
        }
        if let Some(members) = parsed.collection {
            graph.record_collection(source_url.clone(), members);
        }
        for edge in parsed.edges {
            graph.add_edge(edge);
        }
        for link in parsed.links {
            graph.add_link(LinkEdge {
                from: link.from,
                relation: link.relation,
                href: link.href.to_string(),
            });
        }

        if depth < self.config.max_depth {
            for href in parsed.follow {
                if seen.insert(href.to_string()) {
                    debug!(url = %href, depth = depth + 1, "Enqueued");
                    next.push(href);
                }
            }
        }
    }
}

/// One-shot traversal with default concurrency and path-based HAL keys.
///
/// HAL resources are keyed with `PathSegmentKeys::new()`, which assumes
/// `/<type>/<id>` pairs from the root of the path. Services mounted under a
/// prefix such as `/api` need `DiscoveryWalker::with_key_extractor` with
/// `PathSegmentKeys::with_base_path` or a `LinkRegistry`.
pub async fn discover<F: Fetch>(
    seed: &str,
    fetch: F,
    max_depth: usize,
) -> Result<DiscoveredGraph, DiscoveryError> {
    DiscoveryWalker::new(fetch, WalkerConfig::default().with_max_depth(max_depth))
        .discover(seed)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::fetch::InMemoryFetcher;
    use crate::discovery::graph::ResourceKey;
    use serde_json::json;

    #[test]
    fn test_cancel_pair() {
        let (handle, signal) = cancel_pair();
        let observer = signal.clone();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(observer.is_cancelled());
        assert!(!CancelSignal::never().is_cancelled());
    }

    #[tokio::test]
    async fn test_invalid_seed_is_an_error() {
        let err = discover("not a url", InMemoryFetcher::new(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_max_depth_zero_fetches_seed_only() {
        let fetcher = Arc::new(
            InMemoryFetcher::new()
                .with_json_api(
                    "http://api.test/orders/1",
                    json!({"data": {"type": "order", "id": "1", "attributes": {},
                        "relationships": {"customer": {"links": {"related": "/customers/7"}, "data": null}}}}),
                )
                .with_json_api(
                    "http://api.test/customers/7",
                    json!({"data": {"type": "customer", "id": "7", "attributes": {}}}),
                ),
        );

        let graph = discover("http://api.test/orders/1", fetcher.clone(), 0)
            .await
            .unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(fetcher.requests(), vec!["http://api.test/orders/1".to_string()]);
        assert_eq!(graph.links().len(), 1);
    }

    #[tokio::test]
    async fn test_embedded_self_urls_are_not_refetched() {
        let fetcher = Arc::new(
            InMemoryFetcher::new().with_hal(
                "http://api.test/orders/1",
                json!({
                    "_links": {
                        "self": {"href": "/orders/1"},
                        "customer": {"href": "/customers/7"}
                    },
                    "_embedded": {
                        "customer": {"_links": {"self": {"href": "/customers/7"}}, "name": "Ada"}
                    }
                }),
            ),
        );

        let graph = discover("http://api.test/orders/1", fetcher.clone(), 3)
            .await
            .unwrap();
        assert_eq!(fetcher.requests().len(), 1);
        assert_eq!(
            graph.node(&ResourceKey::new("customers", "7")).unwrap().attributes["name"],
            json!("Ada")
        );
        assert!(graph.failures().next().is_none());
    }
}
