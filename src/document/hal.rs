//! HAL document builder
//!
//! Output shape:
//!
//! ```text
//! {
//!   "_links":    { "self": {"href": ..}, "<relation>": {"href": ..}, .. },
//!   "_embedded": { "<relation>": {..} | [{..}, ..] },   // only when something is embedded
//!   "<attribute>": .., ..
//! }
//! ```
//!
//! Embedding a relationship never removes its `_links` entry.

use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::descriptor::{Cardinality, CollectionDescriptor, RelatedData, ResourceDescriptor};
use crate::document::{DocumentBuilder, HypermediaDocument, HypermediaFormat};
use crate::error::Result;
use crate::links::{LinkContext, LinkRegistry, SELF_RELATION};

pub const LINKS_KEY: &str = "_links";
pub const EMBEDDED_KEY: &str = "_embedded";

/// Renders `application/hal+json` documents
#[derive(Debug, Clone)]
pub struct HalBuilder {
    registry: Arc<LinkRegistry>,
}

impl HalBuilder {
    pub fn new(registry: Arc<LinkRegistry>) -> Self {
        Self { registry }
    }

    fn render(&self, descriptor: &ResourceDescriptor) -> Result<Value> {
        let ctx = LinkContext::for_resource(descriptor);
        let resource_type = descriptor.resource_type.as_str();

        let mut links = Map::new();
        links.insert(
            SELF_RELATION.to_string(),
            href(self.registry.resolve(resource_type, SELF_RELATION, &ctx)?),
        );

        let mut embedded = Map::new();
        for relationship in &descriptor.relationships {
            let url = self
                .registry
                .resolve(
                    resource_type,
                    relationship.link_relation(),
                    &ctx.for_relationship(relationship),
                )?;
            links.insert(relationship.name.clone(), href(url));

            match (&relationship.cardinality, &relationship.data) {
                (Cardinality::ToOne, Some(RelatedData::One(related))) => {
                    if let Some(sub) = related.embedded() {
                        embedded.insert(relationship.name.clone(), self.render(sub)?);
                    }
                }
                (Cardinality::ToMany, Some(RelatedData::Many(_))) => {
                    let docs = relationship
                        .embedded()
                        .map(|sub| self.render(sub))
                        .collect::<Result<Vec<_>>>()?;
                    if !docs.is_empty() {
                        embedded.insert(relationship.name.clone(), Value::Array(docs));
                    }
                }
                // shape mismatches are rejected by validate()
                _ => {}
            }
        }

        let mut doc = Map::new();
        doc.insert(LINKS_KEY.to_string(), Value::Object(links));
        if !embedded.is_empty() {
            doc.insert(EMBEDDED_KEY.to_string(), Value::Object(embedded));
        }
        for (key, value) in &descriptor.attributes {
            doc.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(doc))
    }
}

fn href(url: String) -> Value {
    json!({ "href": url })
}

impl DocumentBuilder for HalBuilder {
    fn format(&self) -> HypermediaFormat {
        HypermediaFormat::Hal
    }

    fn build(&self, descriptor: &ResourceDescriptor) -> Result<HypermediaDocument> {
        descriptor.validate()?;
        let body = self.render(descriptor)?;
        tracing::debug!(
            resource_type = %descriptor.resource_type,
            id = %descriptor.id,
            "Rendered HAL document"
        );
        Ok(HypermediaDocument::new(HypermediaFormat::Hal, body))
    }

    fn build_collection(&self, collection: &CollectionDescriptor) -> Result<HypermediaDocument> {
        collection.validate()?;
        let members = collection
            .members
            .iter()
            .map(|member| self.render(member))
            .collect::<Result<Vec<_>>>()?;

        let mut embedded = Map::new();
        embedded.insert(collection.resource_type.clone(), Value::Array(members));

        let mut doc = Map::new();
        doc.insert(
            LINKS_KEY.to_string(),
            json!({ "self": { "href": collection.href } }),
        );
        doc.insert(EMBEDDED_KEY.to_string(), Value::Object(embedded));
        doc.insert("count".to_string(), json!(collection.members.len()));

        tracing::debug!(
            resource_type = %collection.resource_type,
            members = collection.members.len(),
            "Rendered HAL collection"
        );
        Ok(HypermediaDocument::new(HypermediaFormat::Hal, Value::Object(doc)))
    }
}
