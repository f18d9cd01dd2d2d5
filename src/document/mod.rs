//! Hypermedia documents and the builders that render them
//!
//! Both wire formats are implementations of one `DocumentBuilder`
//! capability over the shared `ResourceDescriptor` input, so the domain
//! layer stays format-agnostic. Building is pure and synchronous: given
//! the same descriptor and registry the output is byte-for-byte identical.

pub mod hal;
pub mod jsonapi;

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::{CollectionDescriptor, ResourceDescriptor};
use crate::error::Result;
use crate::links::LinkRegistry;

pub use hal::HalBuilder;
pub use jsonapi::JsonApiBuilder;

pub const HAL_CONTENT_TYPE: &str = "application/hal+json";
pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";

/// Supported hypermedia wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypermediaFormat {
    Hal,
    JsonApi,
}

impl HypermediaFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            HypermediaFormat::Hal => HAL_CONTENT_TYPE,
            HypermediaFormat::JsonApi => JSON_API_CONTENT_TYPE,
        }
    }

    /// Map a `Content-Type` header value to a format, ignoring parameters
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media_type.as_str() {
            HAL_CONTENT_TYPE => Some(HypermediaFormat::Hal),
            JSON_API_CONTENT_TYPE => Some(HypermediaFormat::JsonApi),
            _ => None,
        }
    }

    /// Pick a format from an `Accept` header; HAL when nothing matches.
    ///
    /// Media ranges are taken in header order; `q` values are not weighed.
    pub fn negotiate(accept: Option<&str>) -> Self {
        accept
            .into_iter()
            .flat_map(|header| header.split(','))
            .find_map(Self::from_content_type)
            .unwrap_or(HypermediaFormat::Hal)
    }
}

impl fmt::Display for HypermediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HypermediaFormat::Hal => f.write_str("HAL"),
            HypermediaFormat::JsonApi => f.write_str("JSON:API"),
        }
    }
}

/// A rendered, immutable hypermedia document
#[derive(Debug, Clone, PartialEq)]
pub struct HypermediaDocument {
    format: HypermediaFormat,
    body: Value,
}

impl HypermediaDocument {
    pub(crate) fn new(format: HypermediaFormat, body: Value) -> Self {
        Self { format, body }
    }

    pub fn format(&self) -> HypermediaFormat {
        self.format
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.body)?)
    }

    pub fn to_json_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.body)?)
    }
}

/// Renders descriptors into one hypermedia format
pub trait DocumentBuilder: Send + Sync {
    fn format(&self) -> HypermediaFormat;

    /// Render a single resource. Validation happens first; on error no
    /// document is produced.
    fn build(&self, descriptor: &ResourceDescriptor) -> Result<HypermediaDocument>;

    /// Render a resolved collection of resources
    fn build_collection(&self, collection: &CollectionDescriptor) -> Result<HypermediaDocument>;
}

/// Builder for `format` sharing `registry`
pub fn builder_for(format: HypermediaFormat, registry: Arc<LinkRegistry>) -> Box<dyn DocumentBuilder> {
    match format {
        HypermediaFormat::Hal => Box::new(HalBuilder::new(registry)),
        HypermediaFormat::JsonApi => Box::new(JsonApiBuilder::new(registry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_content_type_ignores_parameters() {
        assert_eq!(
            HypermediaFormat::from_content_type("application/hal+json; charset=utf-8"),
            Some(HypermediaFormat::Hal)
        );
        assert_eq!(
            HypermediaFormat::from_content_type("Application/Vnd.Api+Json"),
            Some(HypermediaFormat::JsonApi)
        );
        assert_eq!(HypermediaFormat::from_content_type("application/json"), None);
    }

    #[test]
    fn test_negotiate() {
        assert_eq!(HypermediaFormat::negotiate(None), HypermediaFormat::Hal);
        assert_eq!(
            HypermediaFormat::negotiate(Some("text/html, application/vnd.api+json")),
            HypermediaFormat::JsonApi
        );
        assert_eq!(
            HypermediaFormat::negotiate(Some("application/hal+json, application/vnd.api+json")),
            HypermediaFormat::Hal
        );
        assert_eq!(
            HypermediaFormat::negotiate(Some("*/*")),
            HypermediaFormat::Hal
        );
    }

    #[test]
    fn test_builder_for_format() {
        let registry = Arc::new(LinkRegistry::default());
        assert_eq!(
            builder_for(HypermediaFormat::JsonApi, registry.clone()).format(),
            HypermediaFormat::JsonApi
        );
        assert_eq!(
            builder_for(HypermediaFormat::Hal, registry).format(),
            HypermediaFormat::Hal
        );
    }
}
