//! JSON:API document builder
//!
//! Relationship `data` blocks only ever carry `{type, id}` identifiers.
//! Full embedded descriptors are flattened into the top-level `included`
//! array, at most once per `(type, id)`, in first-encounter order of a
//! depth-first walk over relationships in declaration order. The primary
//! resource is never repeated in `included`.

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::descriptor::{
    CollectionDescriptor, RelatedData, RelationshipDescriptor, ResourceDescriptor,
    ResourceIdentifier,
};
use crate::document::{DocumentBuilder, HypermediaDocument, HypermediaFormat};
use crate::error::Result;
use crate::links::{LinkContext, LinkRegistry, SELF_RELATION};

/// Renders `application/vnd.api+json` documents
#[derive(Debug, Clone)]
pub struct JsonApiBuilder {
    registry: Arc<LinkRegistry>,
    self_links: bool,
}

/// Accumulates `included` entries for one document
#[derive(Default)]
struct Included {
    seen: HashSet<ResourceIdentifier>,
    resources: Vec<Value>,
}

impl JsonApiBuilder {
    pub fn new(registry: Arc<LinkRegistry>) -> Self {
        Self {
            registry,
            self_links: false,
        }
    }

    /// Emit a top-level `links.self` for single-resource documents
    pub fn with_self_links(mut self, enabled: bool) -> Self {
        self.self_links = enabled;
        self
    }

    /// Bare resource object: `{type, id, attributes, relationships}`
    fn resource_object(&self, descriptor: &ResourceDescriptor) -> Result<Value> {
        let ctx = LinkContext::for_resource(descriptor);

        let mut object = Map::new();
        object.insert("type".to_string(), json!(descriptor.resource_type));
        object.insert("id".to_string(), json!(descriptor.id));
        object.insert(
            "attributes".to_string(),
            Value::Object(descriptor.attributes.clone()),
        );

        if !descriptor.relationships.is_empty() {
            let mut relationships = Map::new();
            for relationship in &descriptor.relationships {
                relationships.insert(
                    relationship.name.clone(),
                    self.relationship_object(&descriptor.resource_type, relationship, &ctx)?,
                );
            }
            object.insert("relationships".to_string(), Value::Object(relationships));
        }

        Ok(Value::Object(object))
    }

    fn relationship_object(
        &self,
        resource_type: &str,
        relationship: &RelationshipDescriptor,
        ctx: &LinkContext,
    ) -> Result<Value> {
        let related = self.registry.resolve_relationship(
            resource_type,
            relationship.link_relation(),
            &ctx.for_relationship(relationship),
        )?;

        let data = match &relationship.data {
            None => Value::Null,
            Some(RelatedData::One(member)) => identifier_object(&member.identifier()),
            Some(RelatedData::Many(members)) => Value::Array(
                members
                    .iter()
                    .map(|member| identifier_object(&member.identifier()))
                    .collect(),
            ),
        };

        Ok(json!({
            "links": { "related": related },
            "data": data,
        }))
    }

    /// Depth-first collection of embedded descriptors into `included`
    fn collect_included(&self, descriptor: &ResourceDescriptor, included: &mut Included) -> Result<()> {
        for relationship in &descriptor.relationships {
            for embedded in relationship.embedded() {
                // a repeated resource may still embed something new
                if included.seen.insert(embedded.identifier()) {
                    included.resources.push(self.resource_object(embedded)?);
                }
                self.collect_included(embedded, included)?;
            }
        }
        Ok(())
    }
}

fn identifier_object(identifier: &ResourceIdentifier) -> Value {
    json!({ "type": identifier.resource_type, "id": identifier.id })
}

impl DocumentBuilder for JsonApiBuilder {
    fn format(&self) -> HypermediaFormat {
        HypermediaFormat::JsonApi
    }

    fn build(&self, descriptor: &ResourceDescriptor) -> Result<HypermediaDocument> {
        descriptor.validate()?;

        let mut doc = Map::new();
        if self.self_links {
            let url = self.registry.resolve(
                &descriptor.resource_type,
                SELF_RELATION,
                &LinkContext::for_resource(descriptor),
            )?;
            doc.insert("links".to_string(), json!({ "self": url }));
        }
        doc.insert("data".to_string(), self.resource_object(descriptor)?);

        let mut included = Included::default();
        included.seen.insert(descriptor.identifier());
        self.collect_included(descriptor, &mut included)?;
        let included_count = included.resources.len();
        if !included.resources.is_empty() {
            doc.insert("included".to_string(), Value::Array(included.resources));
        }

        tracing::debug!(
            resource_type = %descriptor.resource_type,
            id = %descriptor.id,
            included = included_count,
            "Rendered JSON:API document"
        );
        Ok(HypermediaDocument::new(HypermediaFormat::JsonApi, Value::Object(doc)))
    }

    fn build_collection(&self, collection: &CollectionDescriptor) -> Result<HypermediaDocument> {
        collection.validate()?;

        let mut included = Included::default();
        for member in &collection.members {
            included.seen.insert(member.identifier());
        }

        let mut data = Vec::with_capacity(collection.members.len());
        for member in &collection.members {
            data.push(self.resource_object(member)?);
            self.collect_included(member, &mut included)?;
        }

        let mut doc = Map::new();
        doc.insert("links".to_string(), json!({ "self": collection.href }));
        doc.insert("data".to_string(), Value::Array(data));
        if !included.resources.is_empty() {
            doc.insert("included".to_string(), Value::Array(included.resources));
        }

        tracing::debug!(
            resource_type = %collection.resource_type,
            members = collection.members.len(),
            "Rendered JSON:API collection"
        );
        Ok(HypermediaDocument::new(HypermediaFormat::JsonApi, Value::Object(doc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Cardinality, Related};
    use pretty_assertions::assert_eq;

    fn registry() -> Arc<LinkRegistry> {
        Arc::new(
            LinkRegistry::builder()
                .resource("order", "/orders/{id}")
                .relationship("order", "/orders/{id}/relationships/{relation}")
                .relation("order", "items", "/orders/{id}/items")
                .relation("order", "billingItems", "/orders/{id}/billing-items")
                .relation("order", "shippingItems", "/orders/{id}/shipping-items")
                .relation("order", "customer", "/customers/{customer_id}")
                .resource("item", "/items/{id}")
                .relation("item", "product", "/products/{product_id}")
                .resource("product", "/products/{id}")
                .resource("customer", "/customers/{id}")
                .relation("customer", "orders", "/customers/{id}/orders")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_null_versus_empty_to_many() {
        let order = ResourceDescriptor::new("order", "1")
            .with_attribute("customer_id", json!("7"))
            .with_relationship(RelationshipDescriptor::to_many(
                "items",
                Vec::<ResourceIdentifier>::new(),
            ))
            .with_relationship(RelationshipDescriptor::link_only("customer", Cardinality::ToOne));

        let doc = JsonApiBuilder::new(registry()).build(&order).unwrap();
        let relationships = &doc.body()["data"]["relationships"];
        assert_eq!(relationships["items"]["data"], json!([]));
        assert!(relationships["customer"]["data"].is_null());
        assert!(relationships["customer"].as_object().unwrap().contains_key("data"));
        assert!(doc.body().get("included").is_none());
    }

    #[test]
    fn test_nested_embedding_flattened_into_included() {
        let product = ResourceDescriptor::new("product", "p1").with_attribute("sku", json!("X-1"));
        let item = ResourceDescriptor::new("item", "a")
            .with_attribute("product_id", json!("p1"))
            .with_relationship(RelationshipDescriptor::to_one("product", product));
        let order = ResourceDescriptor::new("order", "1")
            .with_relationship(RelationshipDescriptor::to_many("items", vec![Related::from(item)]));

        let doc = JsonApiBuilder::new(registry()).build(&order).unwrap();
        assert_eq!(
            doc.body()["included"],
            json!([
                {
                    "type": "item",
                    "id": "a",
                    "attributes": {"product_id": "p1"},
                    "relationships": {
                        "product": {
                            "links": {"related": "/products/p1"},
                            "data": {"type": "product", "id": "p1"}
                        }
                    }
                },
                {
                    "type": "product",
                    "id": "p1",
                    "attributes": {"sku": "X-1"}
                }
            ])
        );
    }

    #[test]
    fn test_repeated_resource_still_contributes_nested_embeds() {
        let shallow = ResourceDescriptor::new("item", "b");
        let deep = ResourceDescriptor::new("item", "b")
            .with_attribute("product_id", json!("p1"))
            .with_relationship(RelationshipDescriptor::to_one(
                "product",
                ResourceDescriptor::new("product", "p1"),
            ));
        let order = ResourceDescriptor::new("order", "1")
            .with_relationship(RelationshipDescriptor::to_many("billingItems", vec![Related::from(shallow)]))
            .with_relationship(RelationshipDescriptor::to_many("shippingItems", vec![Related::from(deep)]));

        let doc = JsonApiBuilder::new(registry()).build(&order).unwrap();
        assert_eq!(
            doc.body()["included"],
            json!([
                {"type": "item", "id": "b", "attributes": {}},
                {"type": "product", "id": "p1", "attributes": {}}
            ])
        );
    }

    #[test]
    fn test_relationship_url_names_the_relationship_not_its_registry_key() {
        let order = ResourceDescriptor::new("order", "1").with_relationship(
            RelationshipDescriptor::to_many("lineItems", Vec::<ResourceIdentifier>::new()).via("items"),
        );
        let doc = JsonApiBuilder::new(registry()).build(&order).unwrap();
        assert_eq!(
            doc.body()["data"]["relationships"]["lineItems"]["links"]["related"],
            json!("/orders/1/relationships/lineItems")
        );
    }

    #[test]
    fn test_primary_resource_never_included() {
        let customer = ResourceDescriptor::new("customer", "7").with_relationship(
            RelationshipDescriptor::to_many(
                "orders",
                vec![Related::from(ResourceDescriptor::new("order", "1"))],
            ),
        );
        let order = ResourceDescriptor::new("order", "1")
            .with_attribute("customer_id", json!("7"))
            .with_relationship(RelationshipDescriptor::to_one("customer", customer));

        let doc = JsonApiBuilder::new(registry()).build(&order).unwrap();
        let included = doc.body()["included"].as_array().unwrap();
        assert_eq!(included.len(), 1);
        assert_eq!(included[0]["type"], json!("customer"));
    }

    #[test]
    fn test_self_links_option() {
        let order = ResourceDescriptor::new("order", "1");
        let doc = JsonApiBuilder::new(registry())
            .with_self_links(true)
            .build(&order)
            .unwrap();
        assert_eq!(doc.body()["links"], json!({"self": "/orders/1"}));
        assert!(doc.body()["data"].get("relationships").is_none());
    }

    #[test]
    fn test_collection_document() {
        let product = ResourceDescriptor::new("product", "p1");
        let collection = CollectionDescriptor::new(
            "item",
            "/orders/1/items",
            vec![
                ResourceDescriptor::new("item", "a")
                    .with_attribute("product_id", json!("p1"))
                    .with_relationship(RelationshipDescriptor::to_one("product", product.clone())),
                ResourceDescriptor::new("item", "b")
                    .with_attribute("product_id", json!("p1"))
                    .with_relationship(RelationshipDescriptor::to_one("product", product)),
            ],
        );

        let doc = JsonApiBuilder::new(registry())
            .build_collection(&collection)
            .unwrap();
        assert_eq!(doc.content_type(), "application/vnd.api+json");
        assert_eq!(doc.body()["links"], json!({"self": "/orders/1/items"}));
        assert_eq!(doc.body()["data"].as_array().unwrap().len(), 2);
        assert_eq!(
            doc.body()["included"],
            json!([{"type": "product", "id": "p1", "attributes": {}}])
        );
    }

    #[test]
    fn test_unknown_relation_surfaces() {
        let order = ResourceDescriptor::new("order", "1")
            .with_relationship(RelationshipDescriptor::link_only("refunds", Cardinality::ToMany));
        let err = JsonApiBuilder::new(registry()).build(&order).unwrap_err();
        assert!(err.is_unknown_relation());
    }
}
