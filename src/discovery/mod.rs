//! Client-side discovery of a resource graph from served hypermedia

pub mod fetch;
pub mod graph;
pub mod keys;
pub mod parse;
pub mod walker;

pub use fetch::{Fetch, FetchedDocument, HttpFetcher, InMemoryFetcher};
pub use graph::{
    DiscoveredGraph, Edge, FailureKind, FailureRecord, LinkEdge, NodeSnapshot, ResourceKey,
};
pub use keys::{KeyExtractor, PathSegmentKeys};
pub use parse::{detect_format, normalize_url, parse_document, ParsedDocument, ParsedLink, ParsedNode};
pub use walker::{cancel_pair, discover, CancelHandle, CancelSignal, DiscoveryWalker};
