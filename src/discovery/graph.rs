//! Client-side model of discovered resources
//!
//! Nodes live in an arena keyed by `(type, id)`, so a resource reached via
//! several URLs or several documents is stored exactly once. The graph is
//! owned by a single walker for the duration of a traversal session and
//! only grows during it.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::descriptor::ResourceIdentifier;
use crate::document::HypermediaFormat;

/// Identity of a discovered resource
pub type ResourceKey = ResourceIdentifier;

/// Last-seen state of a resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub key: ResourceKey,
    pub attributes: Map<String, Value>,
    pub format: HypermediaFormat,
    /// Canonical URL when the document advertised one
    pub self_url: Option<String>,
    /// URL of the document the snapshot was taken from
    pub source_url: String,
    pub depth: usize,
}

/// A relation between two identified resources
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub from: ResourceKey,
    pub relation: String,
    pub to: ResourceKey,
}

impl Edge {
    pub fn new(from: ResourceKey, relation: impl Into<String>, to: ResourceKey) -> Self {
        Self {
            from,
            relation: relation.into(),
            to,
        }
    }
}

/// A relation whose target is only known by URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkEdge {
    pub from: ResourceKey,
    pub relation: String,
    pub href: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport or HTTP failure
    FetchFailed,
    /// Fetched but neither HAL nor JSON:API
    Unparseable,
}

/// A URL that could not contribute a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub url: String,
    pub depth: usize,
    pub kind: FailureKind,
    pub message: String,
}

/// Graph accumulated by one traversal session
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveredGraph {
    #[serde(serialize_with = "values_as_seq")]
    nodes: BTreeMap<ResourceKey, NodeSnapshot>,
    edges: BTreeSet<Edge>,
    links: BTreeSet<LinkEdge>,
    /// URL -> resource served there
    locations: BTreeMap<String, ResourceKey>,
    /// URL -> members of the collection served there
    collections: BTreeMap<String, Vec<ResourceKey>>,
    failures: BTreeMap<String, FailureRecord>,
    /// Fetched URLs in processing order
    visited: Vec<String>,
    cancelled: bool,
}

fn values_as_seq<S: Serializer>(
    nodes: &BTreeMap<ResourceKey, NodeSnapshot>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(nodes.values())
}

impl DiscoveredGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a node snapshot.
    ///
    /// Identifier-only sightings (`complete == false`) never replace a
    /// snapshot that already carries content.
    pub fn upsert_node(&mut self, snapshot: NodeSnapshot, complete: bool) {
        if !complete && self.nodes.contains_key(&snapshot.key) {
            return;
        }
        if let Some(url) = &snapshot.self_url {
            self.locations.insert(url.clone(), snapshot.key.clone());
        }
        self.nodes.insert(snapshot.key.clone(), snapshot);
    }

    pub fn add_edge(&mut self, edge: Edge) -> bool {
        self.edges.insert(edge)
    }

    pub fn add_link(&mut self, link: LinkEdge) -> bool {
        self.links.insert(link)
    }

    pub fn record_location(&mut self, url: impl Into<String>, key: ResourceKey) {
        self.locations.insert(url.into(), key);
    }

    /// Remember that `url` served a collection; members are unioned
    pub fn record_collection(&mut self, url: impl Into<String>, members: Vec<ResourceKey>) {
        let entry = self.collections.entry(url.into()).or_default();
        for member in members {
            if !entry.contains(&member) {
                entry.push(member);
            }
        }
    }

    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.failures.insert(failure.url.clone(), failure);
    }

    pub(crate) fn record_visit(&mut self, url: impl Into<String>) {
        self.visited.push(url.into());
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Drop everything; used between independent traversal sessions
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn node(&self, key: &ResourceKey) -> Option<&NodeSnapshot> {
        self.nodes.get(key)
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeSnapshot> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Distinct resource types seen, sorted
    pub fn resource_types(&self) -> BTreeSet<&str> {
        self.nodes.keys().map(|k| k.resource_type.as_str()).collect()
    }

    /// Edges recorded directly from identifiers or embedded documents
    pub fn edges(&self) -> &BTreeSet<Edge> {
        &self.edges
    }

    pub fn links(&self) -> &BTreeSet<LinkEdge> {
        &self.links
    }

    pub fn location(&self, url: &str) -> Option<&ResourceKey> {
        self.locations.get(url)
    }

    pub fn collection(&self, url: &str) -> Option<&[ResourceKey]> {
        self.collections.get(url).map(Vec::as_slice)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failures.values()
    }

    pub fn failure(&self, url: &str) -> Option<&FailureRecord> {
        self.failures.get(url)
    }

    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    /// True when the session stopped on a cancellation signal
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Direct edges plus every link edge whose target URL resolved to a
    /// resource or a collection of resources
    pub fn resolved_edges(&self) -> BTreeSet<Edge> {
        let mut resolved = self.edges.clone();
        for link in &self.links {
            if let Some(to) = self.locations.get(&link.href) {
                resolved.insert(Edge::new(link.from.clone(), link.relation.clone(), to.clone()));
            }
            if let Some(members) = self.collections.get(&link.href) {
                for to in members {
                    resolved.insert(Edge::new(link.from.clone(), link.relation.clone(), to.clone()));
                }
            }
        }
        resolved
    }

    /// Edges leaving `key`, resolved
    pub fn outgoing(&self, key: &ResourceKey) -> Vec<Edge> {
        self.resolved_edges()
            .into_iter()
            .filter(|edge| &edge.from == key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(t: &str, id: &str) -> ResourceKey {
        ResourceKey::new(t, id)
    }

    fn snapshot(t: &str, id: &str, attrs: Value) -> NodeSnapshot {
        NodeSnapshot {
            key: key(t, id),
            attributes: attrs.as_object().cloned().unwrap_or_default(),
            format: HypermediaFormat::JsonApi,
            self_url: Some(format!("http://api.test/{}s/{}", t, id)),
            source_url: format!("http://api.test/{}s/{}", t, id),
            depth: 0,
        }
    }

    #[test]
    fn test_revisit_overwrites_snapshot() {
        let mut graph = DiscoveredGraph::new();
        graph.upsert_node(snapshot("order", "1", json!({"total": 1})), true);
        graph.upsert_node(snapshot("order", "1", json!({"total": 2})), true);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            graph.node(&key("order", "1")).unwrap().attributes["total"],
            json!(2)
        );
    }

    #[test]
    fn test_identifier_sighting_keeps_content() {
        let mut graph = DiscoveredGraph::new();
        graph.upsert_node(snapshot("order", "1", json!({"total": 1})), true);
        graph.upsert_node(snapshot("order", "1", json!({})), false);
        assert_eq!(
            graph.node(&key("order", "1")).unwrap().attributes["total"],
            json!(1)
        );
    }

    #[test]
    fn test_resolved_edges_through_locations_and_collections() {
        let mut graph = DiscoveredGraph::new();
        graph.record_location("http://api.test/customers/7", key("customer", "7"));
        graph.record_collection(
            "http://api.test/orders/1/items",
            vec![key("item", "a"), key("item", "b")],
        );
        graph.add_link(LinkEdge {
            from: key("order", "1"),
            relation: "customer".into(),
            href: "http://api.test/customers/7".into(),
        });
        graph.add_link(LinkEdge {
            from: key("order", "1"),
            relation: "items".into(),
            href: "http://api.test/orders/1/items".into(),
        });
        graph.add_link(LinkEdge {
            from: key("order", "1"),
            relation: "invoices".into(),
            href: "http://api.test/orders/1/invoices".into(),
        });

        let edges = graph.resolved_edges();
        assert_eq!(edges.len(), 3);
        assert!(edges.contains(&Edge::new(key("order", "1"), "customer", key("customer", "7"))));
        assert!(edges.contains(&Edge::new(key("order", "1"), "items", key("item", "b"))));
        assert_eq!(graph.outgoing(&key("order", "1")).len(), 3);
    }

    #[test]
    fn test_serializes_nodes_as_sequence() {
        let mut graph = DiscoveredGraph::new();
        graph.upsert_node(snapshot("order", "1", json!({"total": 1})), true);
        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["nodes"][0]["key"], json!({"type": "order", "id": "1"}));
        assert_eq!(value["cancelled"], json!(false));
    }

    #[test]
    fn test_clear_resets_session() {
        let mut graph = DiscoveredGraph::new();
        graph.upsert_node(snapshot("order", "1", json!({})), true);
        graph.mark_cancelled();
        graph.clear();
        assert_eq!(graph.node_count(), 0);
        assert!(!graph.is_cancelled());
    }
}
