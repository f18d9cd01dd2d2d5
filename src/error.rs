//! Error types for the hypermedia engine
//!
//! Build-time errors (`HypermediaError`) are local to a single render and
//! must be handled before a response is sent. Traversal-time errors
//! (`DiscoveryError`, `FetchError`) are recorded in the discovered graph
//! and never abort a traversal.

use thiserror::Error;

/// Main error type for registry configuration and document building
#[derive(Error, Debug)]
pub enum HypermediaError {
    #[error("No link template registered for relation '{relation}' on resource type '{resource_type}'")]
    UnknownRelation {
        resource_type: String,
        relation: String,
    },

    #[error("Malformed descriptor {resource_type}:{id}: {reason}")]
    MalformedDescriptor {
        resource_type: String,
        id: String,
        reason: String,
    },

    #[error("Template '{template}' requires parameter '{parameter}' but no value was supplied")]
    MissingTemplateParameter { template: String, parameter: String },

    #[error("Invalid link template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HypermediaError {
    pub(crate) fn malformed(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        HypermediaError::MalformedDescriptor {
            resource_type: resource_type.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that mean "the registry cannot address this link"
    pub fn is_unknown_relation(&self) -> bool {
        matches!(self, HypermediaError::UnknownRelation { .. })
    }
}

pub type Result<T> = std::result::Result<T, HypermediaError>;

/// Errors returned by a [`crate::discovery::Fetch`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("No document registered for {0}")]
    NotFound(String),
}

/// Per-node failures recorded by the discovery walker
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Document at {url} is neither HAL nor JSON:API: {reason}")]
    UnrecognizedFormat { url: String, reason: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Document at {url} is not valid JSON: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_relation_display() {
        let err = HypermediaError::UnknownRelation {
            resource_type: "order".to_string(),
            relation: "refunds".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No link template registered for relation 'refunds' on resource type 'order'"
        );
        assert!(err.is_unknown_relation());
    }

    #[test]
    fn test_malformed_helper() {
        let err = HypermediaError::malformed("order", "1", "empty id");
        assert_eq!(err.to_string(), "Malformed descriptor order:1: empty id");
        assert!(!err.is_unknown_relation());
    }

    #[test]
    fn test_fetch_error_source_chain() {
        use std::error::Error as _;

        let err = DiscoveryError::Fetch {
            url: "http://api.test/orders/1".to_string(),
            source: FetchError::Status { status: 503 },
        };
        assert!(err.to_string().contains("http://api.test/orders/1"));
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("Unexpected HTTP status 503".to_string())
        );
    }
}
