//! Link registry
//!
//! The `LinkRegistry` maps `(resource type, relation name)` pairs to URL
//! templates. It is populated once at startup (from YAML or the builder)
//! and is read-only afterwards, so it can be shared as `Arc<LinkRegistry>`
//! by concurrent document builds. Reconfiguration means building a new
//! registry instance.

use std::collections::BTreeMap;

use crate::config::LinkRegistryConfig;
use crate::descriptor::{RelatedData, RelationshipDescriptor, ResourceDescriptor};
use crate::error::{HypermediaError, Result};
use crate::links::template::LinkTemplate;

/// Relation name reserved for a resource's canonical URL
pub const SELF_RELATION: &str = "self";

/// Placeholder bound to the relation name in relationship templates
pub const RELATION_PARAM: &str = "relation";

/// Values available to template expansion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkContext {
    params: BTreeMap<String, String>,
}

impl LinkContext {
    /// Context carrying only an `{id}` value
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), id.into());
        Self { params }
    }

    /// Context for rendering links of `descriptor`.
    ///
    /// Binds `{id}` plus every scalar attribute, so relation templates can
    /// address a related resource by a foreign key (e.g. `{customer_id}`).
    pub fn for_resource(descriptor: &ResourceDescriptor) -> Self {
        let mut params: BTreeMap<String, String> = descriptor
            .attributes
            .iter()
            .filter_map(|(key, value)| scalar_to_param(value).map(|v| (key.clone(), v)))
            .collect();
        params.insert("id".to_string(), descriptor.id.clone());
        Self { params }
    }

    /// Context for one relationship link of a resource.
    ///
    /// Adds `{relation}` (the relationship name) and, for a to-one with
    /// resolved data, the related id as `{related_id}` and `{<name>_id}`.
    /// Values already bound from attributes are kept.
    pub fn for_relationship(&self, relationship: &RelationshipDescriptor) -> Self {
        let mut params = self.params.clone();
        params.insert(RELATION_PARAM.to_string(), relationship.name.clone());
        if let Some(RelatedData::One(related)) = &relationship.data {
            let related_id = related.identifier().id;
            params
                .entry(format!("{}_id", relationship.name))
                .or_insert_with(|| related_id.clone());
            params
                .entry("related_id".to_string())
                .or_insert(related_id);
        }
        Self { params }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub(crate) fn values(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

fn scalar_to_param(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Templates registered for one resource type
#[derive(Debug, Clone)]
struct ResourceLinks {
    self_template: LinkTemplate,
    relationship: Option<LinkTemplate>,
    relations: BTreeMap<String, LinkTemplate>,
}

/// Immutable table of link templates keyed by resource type
#[derive(Debug, Clone, Default)]
pub struct LinkRegistry {
    base_url: String,
    resources: BTreeMap<String, ResourceLinks>,
}

impl LinkRegistry {
    pub fn builder() -> LinkRegistryBuilder {
        LinkRegistryBuilder::default()
    }

    /// Build a registry from configuration, validating every template
    pub fn from_config(config: &LinkRegistryConfig) -> Result<Self> {
        let mut builder = Self::builder().base_url(config.base_url.clone());
        for (resource_type, links) in &config.resources {
            builder = builder.resource(resource_type.clone(), links.self_template.clone());
            if let Some(relationship) = &links.relationship {
                builder = builder.relationship(resource_type.clone(), relationship.clone());
            }
            for (relation, template) in &links.relations {
                builder = builder.relation(resource_type.clone(), relation.clone(), template.clone());
            }
        }
        builder.build()
    }

    /// Resolve the URL for `(resource_type, relation)`.
    ///
    /// `"self"` resolves to the type's canonical template; any other name
    /// must have been registered as a relation.
    pub fn resolve(&self, resource_type: &str, relation: &str, ctx: &LinkContext) -> Result<String> {
        let template = self.template(resource_type, relation)?;
        self.expand(template, ctx.values())
    }

    /// Resolve the JSON:API relationship URL for `(resource_type, relation)`.
    ///
    /// The relation must be registered. When the type declares a
    /// relationship template it is expanded with `{relation}` bound to the
    /// relation name, unless `ctx` already carries the relationship's own
    /// name; otherwise the relation's own template is used.
    pub fn resolve_relationship(
        &self,
        resource_type: &str,
        relation: &str,
        ctx: &LinkContext,
    ) -> Result<String> {
        let related = self.template(resource_type, relation)?;
        match self
            .resources
            .get(resource_type)
            .and_then(|links| links.relationship.as_ref())
        {
            Some(relationship) => {
                let mut values = ctx.values().clone();
                values
                    .entry(RELATION_PARAM.to_string())
                    .or_insert_with(|| relation.to_string());
                self.expand(relationship, &values)
            }
            None => self.expand(related, ctx.values()),
        }
    }

    /// Check whether a template exists for `(resource_type, relation)`
    pub fn has_relation(&self, resource_type: &str, relation: &str) -> bool {
        self.template(resource_type, relation).is_ok()
    }

    /// All registered resource types, sorted
    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Reverse-match a URL path against every self template.
    ///
    /// Returns the first `(resource type, id)` whose self template matches,
    /// in resource-type order.
    pub fn identify_path(&self, path: &str) -> Option<(String, String)> {
        let path = self.strip_base_path(path);
        self.resources.iter().find_map(|(resource_type, links)| {
            let captures = links.self_template.match_path(path)?;
            let id = captures.get("id")?.clone();
            Some((resource_type.clone(), id))
        })
    }

    fn strip_base_path<'a>(&self, path: &'a str) -> &'a str {
        let base_path = match url::Url::parse(&self.base_url) {
            Ok(url) => url.path().trim_end_matches('/').to_string(),
            Err(_) => self.base_url.trim_end_matches('/').to_string(),
        };
        if base_path.is_empty() {
            return path;
        }
        path.strip_prefix(base_path.as_str()).unwrap_or(path)
    }

    fn template(&self, resource_type: &str, relation: &str) -> Result<&LinkTemplate> {
        let unknown = || HypermediaError::UnknownRelation {
            resource_type: resource_type.to_string(),
            relation: relation.to_string(),
        };
        let links = self.resources.get(resource_type).ok_or_else(unknown)?;
        if relation == SELF_RELATION {
            return Ok(&links.self_template);
        }
        links.relations.get(relation).ok_or_else(unknown)
    }

    fn expand(&self, template: &LinkTemplate, values: &BTreeMap<String, String>) -> Result<String> {
        let path = template.expand(values)?;
        if self.base_url.is_empty() {
            Ok(path)
        } else {
            Ok(format!("{}{}", self.base_url.trim_end_matches('/'), path))
        }
    }
}

/// Collects templates before the registry is frozen
#[derive(Debug, Default)]
pub struct LinkRegistryBuilder {
    base_url: String,
    self_templates: BTreeMap<String, String>,
    relationships: BTreeMap<String, String>,
    relations: BTreeMap<String, BTreeMap<String, String>>,
}

impl LinkRegistryBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Register a resource type with its canonical URL template
    pub fn resource(mut self, resource_type: impl Into<String>, self_template: impl Into<String>) -> Self {
        self.self_templates
            .insert(resource_type.into(), self_template.into());
        self
    }

    pub fn relationship(mut self, resource_type: impl Into<String>, template: impl Into<String>) -> Self {
        self.relationships
            .insert(resource_type.into(), template.into());
        self
    }

    pub fn relation(
        mut self,
        resource_type: impl Into<String>,
        relation: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.relations
            .entry(resource_type.into())
            .or_default()
            .insert(relation.into(), template.into());
        self
    }

    /// Parse every template and freeze the registry
    pub fn build(self) -> Result<LinkRegistry> {
        for resource_type in self.relations.keys().chain(self.relationships.keys()) {
            if !self.self_templates.contains_key(resource_type) {
                return Err(HypermediaError::Config(format!(
                    "resource type '{}' has relation templates but no self template",
                    resource_type
                )));
            }
        }

        let mut resources = BTreeMap::new();
        for (resource_type, self_raw) in &self.self_templates {
            let self_template = LinkTemplate::parse(self_raw)?;
            if !self_template.params().any(|p| p == "id") {
                return Err(HypermediaError::InvalidTemplate {
                    template: self_raw.clone(),
                    reason: "self template must contain an {id} placeholder".to_string(),
                });
            }

            let relationship = self
                .relationships
                .get(resource_type)
                .map(|raw| LinkTemplate::parse(raw))
                .transpose()?;

            let mut relations = BTreeMap::new();
            if let Some(raw_relations) = self.relations.get(resource_type) {
                for (relation, raw) in raw_relations {
                    if relation == SELF_RELATION {
                        return Err(HypermediaError::Config(format!(
                            "'{}' is reserved and cannot be registered as a relation of '{}'",
                            SELF_RELATION, resource_type
                        )));
                    }
                    relations.insert(relation.clone(), LinkTemplate::parse(raw)?);
                }
            }

            resources.insert(
                resource_type.clone(),
                ResourceLinks {
                    self_template,
                    relationship,
                    relations,
                },
            );
        }

        tracing::debug!(
            resource_types = resources.len(),
            base_url = %self.base_url,
            "Link registry built"
        );

        Ok(LinkRegistry {
            base_url: self.base_url,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_registry() -> LinkRegistry {
        LinkRegistry::builder()
            .resource("order", "/orders/{id}")
            .relationship("order", "/orders/{id}/relationships/{relation}")
            .relation("order", "items", "/orders/{id}/items")
            .relation("order", "customer", "/customers/{customer_id}")
            .resource("customer", "/customers/{id}")
            .relation("customer", "orders", "/customers/{id}/orders")
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_self_and_relation() {
        let registry = sample_registry();
        let ctx = LinkContext::with_id("1");
        assert_eq!(registry.resolve("order", "self", &ctx).unwrap(), "/orders/1");
        assert_eq!(
            registry.resolve("order", "items", &ctx).unwrap(),
            "/orders/1/items"
        );
    }

    #[test]
    fn test_resolve_unknown_relation() {
        let registry = sample_registry();
        let err = registry
            .resolve("order", "refunds", &LinkContext::with_id("1"))
            .unwrap_err();
        assert!(err.is_unknown_relation());

        let err = registry
            .resolve("invoice", "self", &LinkContext::with_id("1"))
            .unwrap_err();
        assert!(err.is_unknown_relation());
    }

    #[test]
    fn test_resolve_relationship_uses_relationship_template() {
        let registry = sample_registry();
        let ctx = LinkContext::with_id("1");
        assert_eq!(
            registry.resolve_relationship("order", "items", &ctx).unwrap(),
            "/orders/1/relationships/items"
        );
        // customer has no relationship template, falls back to the relation
        assert_eq!(
            registry
                .resolve_relationship("customer", "orders", &LinkContext::with_id("7"))
                .unwrap(),
            "/customers/7/orders"
        );
    }

    #[test]
    fn test_resolve_relationship_requires_registered_relation() {
        let registry = sample_registry();
        let err = registry
            .resolve_relationship("order", "refunds", &LinkContext::with_id("1"))
            .unwrap_err();
        assert!(err.is_unknown_relation());
    }

    #[test]
    fn test_context_for_resource_binds_scalar_attributes() {
        let registry = sample_registry();
        let order = ResourceDescriptor::new("order", "1")
            .with_attribute("customer_id", json!(7))
            .with_attribute("lines", json!([1, 2]));
        let ctx = LinkContext::for_resource(&order);
        assert_eq!(ctx.get("customer_id"), Some("7"));
        assert_eq!(ctx.get("lines"), None);
        assert_eq!(
            registry.resolve("order", "customer", &ctx).unwrap(),
            "/customers/7"
        );
    }

    #[test]
    fn test_context_for_relationship_binds_related_id() {
        let registry = sample_registry();
        let order = ResourceDescriptor::new("order", "1");
        let customer = RelationshipDescriptor::to_one(
            "customer",
            crate::descriptor::ResourceIdentifier::new("customer", "7"),
        );
        let ctx = LinkContext::for_resource(&order).for_relationship(&customer);
        assert_eq!(ctx.get("customer_id"), Some("7"));
        assert_eq!(ctx.get("related_id"), Some("7"));
        assert_eq!(ctx.get("relation"), Some("customer"));
        assert_eq!(
            registry.resolve("order", "customer", &ctx).unwrap(),
            "/customers/7"
        );
    }

    #[test]
    fn test_context_for_relationship_keeps_attribute_values() {
        let order = ResourceDescriptor::new("order", "1").with_attribute("customer_id", json!("9"));
        let customer = RelationshipDescriptor::to_one(
            "customer",
            crate::descriptor::ResourceIdentifier::new("customer", "7"),
        );
        let ctx = LinkContext::for_resource(&order).for_relationship(&customer);
        assert_eq!(ctx.get("customer_id"), Some("9"));
    }

    #[test]
    fn test_base_url_prefix() {
        let registry = LinkRegistry::builder()
            .base_url("https://shop.test/api/")
            .resource("order", "/orders/{id}")
            .build()
            .unwrap();
        assert_eq!(
            registry
                .resolve("order", "self", &LinkContext::with_id("1"))
                .unwrap(),
            "https://shop.test/api/orders/1"
        );
        assert_eq!(
            registry.identify_path("/api/orders/1"),
            Some(("order".to_string(), "1".to_string()))
        );
    }

    #[test]
    fn test_identify_path() {
        let registry = sample_registry();
        assert_eq!(
            registry.identify_path("/customers/7"),
            Some(("customer".to_string(), "7".to_string()))
        );
        assert_eq!(registry.identify_path("/orders/1/items"), None);
    }

    #[test]
    fn test_build_rejects_self_without_id() {
        let err = LinkRegistry::builder()
            .resource("order", "/orders")
            .build()
            .unwrap_err();
        assert!(matches!(err, HypermediaError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_build_rejects_relations_without_resource() {
        let err = LinkRegistry::builder()
            .relation("order", "items", "/orders/{id}/items")
            .build()
            .unwrap_err();
        assert!(matches!(err, HypermediaError::Config(_)));
    }

    #[test]
    fn test_build_rejects_self_relation() {
        let err = LinkRegistry::builder()
            .resource("order", "/orders/{id}")
            .relation("order", "self", "/elsewhere/{id}")
            .build()
            .unwrap_err();
        assert!(matches!(err, HypermediaError::Config(_)));
    }

    #[test]
    fn test_from_config() {
        let config = LinkRegistryConfig::from_yaml(
            r#"
resources:
  order:
    self: /orders/{id}
    relations:
      items: /orders/{id}/items
"#,
        )
        .unwrap();
        let registry = LinkRegistry::from_config(&config).unwrap();
        assert!(registry.has_relation("order", "items"));
        assert!(registry.has_relation("order", "self"));
        assert!(!registry.has_relation("order", "customer"));
        assert_eq!(registry.resource_types().collect::<Vec<_>>(), vec!["order"]);
    }
}
