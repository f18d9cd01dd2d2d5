//! Identity of HAL resources
//!
//! HAL documents carry no `type`/`id` fields, so the walker derives a
//! resource's key from its self URL. JSON:API documents do not need this.

use url::Url;

use crate::discovery::graph::ResourceKey;
use crate::links::LinkRegistry;

/// Derives a `(type, id)` key from a resource's canonical URL
pub trait KeyExtractor: Send + Sync {
    /// `None` means the URL addresses something without identity, such as
    /// a collection
    fn extract(&self, url: &Url) -> Option<ResourceKey>;
}

/// REST path convention: `/<collection>/<id>` pairs.
///
/// After stripping `base_path`, a path with an even number of segments
/// identifies the resource `(penultimate, last)`; an odd number addresses
/// a collection.
#[derive(Debug, Clone, Default)]
pub struct PathSegmentKeys {
    base_path: String,
}

impl PathSegmentKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore a fixed prefix such as `/api/v1`
    pub fn with_base_path(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into().trim_end_matches('/').to_string(),
        }
    }
}

impl KeyExtractor for PathSegmentKeys {
    fn extract(&self, url: &Url) -> Option<ResourceKey> {
        let path = url.path();
        let path = path.strip_prefix(self.base_path.as_str()).unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() || segments.len() % 2 != 0 {
            return None;
        }
        let resource_type = segments[segments.len() - 2];
        let id = urlencoding::decode(segments[segments.len() - 1]).ok()?;
        Some(ResourceKey::new(resource_type, id.into_owned()))
    }
}

/// Reverse-matches self templates; yields the registry's own type names
impl KeyExtractor for LinkRegistry {
    fn extract(&self, url: &Url) -> Option<ResourceKey> {
        self.identify_path(url.path())
            .map(|(resource_type, id)| ResourceKey::new(resource_type, id))
    }
}
