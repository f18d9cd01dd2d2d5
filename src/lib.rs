//! Hypermedia response engine
//!
//! Turns domain resources into self-describing HAL or JSON:API documents
//! and, on the client side, walks served hypermedia to rebuild the
//! resource graph.
//!
//! ## Architecture
//!
//! ```text
//! ResourceDescriptor ──► DocumentBuilder (HAL | JSON:API) ──► HypermediaDocument
//!                              │
//!                              ▼
//!                        LinkRegistry (type, relation) → URL template
//!
//! seed URL ──► DiscoveryWalker ──► Fetch ──► parse ──► DiscoveredGraph
//! ```
//!
//! ## Modules
//!
//! - [`links`]: URL templates and the immutable link registry
//! - [`descriptor`]: format-agnostic resource input
//! - [`document`]: the HAL and JSON:API builders
//! - [`discovery`]: breadth-first client discovery walker
//! - [`config`]: YAML registry and walker settings
//! - `api`: axum response and content negotiation (feature `server`)

pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod document;
pub mod error;
pub mod links;

#[cfg(feature = "server")]
pub mod api;

pub use config::{LinkRegistryConfig, WalkerConfig};
pub use descriptor::{
    Cardinality, CollectionDescriptor, Related, RelatedData, RelationshipDescriptor,
    ResourceDescriptor, ResourceIdentifier,
};
pub use discovery::{
    cancel_pair, discover, CancelHandle, CancelSignal, DiscoveredGraph, DiscoveryWalker, Edge,
    Fetch, FetchedDocument, HttpFetcher, InMemoryFetcher, KeyExtractor, PathSegmentKeys,
    ResourceKey,
};
pub use document::{
    builder_for, DocumentBuilder, HalBuilder, HypermediaDocument, HypermediaFormat, JsonApiBuilder,
    HAL_CONTENT_TYPE, JSON_API_CONTENT_TYPE,
};
pub use error::{DiscoveryError, FetchError, HypermediaError, Result};
pub use links::{LinkContext, LinkRegistry, LinkTemplate};
