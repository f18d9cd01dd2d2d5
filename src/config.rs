//! Configuration parsing
//!
//! Loads the static link-registry table and the discovery walker settings
//! from YAML. Both are read once at startup; the registry built from a
//! `LinkRegistryConfig` is immutable afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// Root configuration for the link registry
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LinkRegistryConfig {
    /// Prefix prepended to every resolved URL (e.g. "https://api.example.com")
    #[serde(default)]
    pub base_url: String,
    /// Link templates per resource type
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceLinksConfig>,
}

/// Link templates for a single resource type
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceLinksConfig {
    /// Canonical URL of an instance (e.g. "/orders/{id}")
    #[serde(rename = "self")]
    pub self_template: String,
    /// JSON:API relationship URL, `{relation}` is bound to the relation name
    #[serde(default)]
    pub relationship: Option<String>,
    /// Relation name -> related URL template
    #[serde(default)]
    pub relations: BTreeMap<String, String>,
}

impl LinkRegistryConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: LinkRegistryConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

/// Settings for a discovery traversal session
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WalkerConfig {
    /// Deepest BFS level to fetch; the seed is depth 0
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum fetches in flight within one depth level
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout used by the HTTP fetcher
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_depth() -> usize {
    3
}

fn default_concurrency() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl WalkerConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Concurrency limit actually applied (never zero)
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: WalkerConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
base_url: "https://shop.test"
resources:
  order:
    self: /orders/{id}
    relationship: /orders/{id}/relationships/{relation}
    relations:
      items: /orders/{id}/items
      customer: /customers/{customer_id}
  item:
    self: /items/{id}
"#;

    #[test]
    fn test_registry_config_from_yaml() {
        let config = LinkRegistryConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.base_url, "https://shop.test");
        assert_eq!(config.resources.len(), 2);

        let order = &config.resources["order"];
        assert_eq!(order.self_template, "/orders/{id}");
        assert_eq!(
            order.relationship.as_deref(),
            Some("/orders/{id}/relationships/{relation}")
        );
        assert_eq!(order.relations["customer"], "/customers/{customer_id}");

        let item = &config.resources["item"];
        assert!(item.relationship.is_none());
        assert!(item.relations.is_empty());
    }

    #[test]
    fn test_registry_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = LinkRegistryConfig::from_file(&path).unwrap();
        assert!(config.resources.contains_key("order"));
    }

    #[test]
    fn test_registry_config_missing_file() {
        assert!(LinkRegistryConfig::from_file("/nonexistent/links.yaml").is_err());
    }

    #[test]
    fn test_walker_config_defaults() {
        let config = WalkerConfig::from_yaml("max_depth: 5").unwrap();
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_walker_config_zero_concurrency_clamped() {
        let config = WalkerConfig::default().with_concurrency(0);
        assert_eq!(config.effective_concurrency(), 1);
    }
}
