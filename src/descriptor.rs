//! Resource descriptors
//!
//! The format-agnostic input to every document builder. The domain layer
//! produces a `ResourceDescriptor` with related resources already resolved
//! to whatever depth it wants rendered; builders render exactly that depth
//! and never fetch anything. Because embedded descriptors are owned
//! (`Box`), a descriptor tree is always finite.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::{HypermediaError, Result};

/// Attribute keys that collide with identity or format envelope fields
const RESERVED_ATTRIBUTES: &[&str] = &["type", "id", "_links", "_embedded", "links", "relationships"];

/// Relationship cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::ToOne => f.write_str("to-one"),
            Cardinality::ToMany => f.write_str("to-many"),
        }
    }
}

/// A bare `{type, id}` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// One related resource, either referenced or fully embedded
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    Identifier(ResourceIdentifier),
    Embedded(Box<ResourceDescriptor>),
}

impl Related {
    pub fn identifier(&self) -> ResourceIdentifier {
        match self {
            Related::Identifier(identifier) => identifier.clone(),
            Related::Embedded(descriptor) => descriptor.identifier(),
        }
    }

    pub fn embedded(&self) -> Option<&ResourceDescriptor> {
        match self {
            Related::Identifier(_) => None,
            Related::Embedded(descriptor) => Some(descriptor),
        }
    }
}

impl From<ResourceIdentifier> for Related {
    fn from(identifier: ResourceIdentifier) -> Self {
        Related::Identifier(identifier)
    }
}

impl From<ResourceDescriptor> for Related {
    fn from(descriptor: ResourceDescriptor) -> Self {
        Related::Embedded(Box::new(descriptor))
    }
}

/// Resolved relationship data; shape must agree with the cardinality
#[derive(Debug, Clone, PartialEq)]
pub enum RelatedData {
    One(Related),
    Many(Vec<Related>),
}

impl RelatedData {
    pub fn members(&self) -> &[Related] {
        match self {
            RelatedData::One(related) => std::slice::from_ref(related),
            RelatedData::Many(related) => related,
        }
    }
}

/// A named relationship of a resource
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub cardinality: Cardinality,
    /// Registry relation used to compute the link; defaults to `name`
    pub link_template: Option<String>,
    /// `None` means "not resolved", distinct from an empty to-many
    pub data: Option<RelatedData>,
}

impl RelationshipDescriptor {
    /// Link-only relationship, data not resolved
    pub fn link_only(name: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            cardinality,
            link_template: None,
            data: None,
        }
    }

    pub fn to_one(name: impl Into<String>, related: impl Into<Related>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::ToOne,
            link_template: None,
            data: Some(RelatedData::One(related.into())),
        }
    }

    pub fn to_many<I, R>(name: impl Into<String>, related: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Related>,
    {
        Self {
            name: name.into(),
            cardinality: Cardinality::ToMany,
            link_template: None,
            data: Some(RelatedData::Many(related.into_iter().map(Into::into).collect())),
        }
    }

    /// Resolve the link through a differently named registry relation
    pub fn via(mut self, link_template: impl Into<String>) -> Self {
        self.link_template = Some(link_template.into());
        self
    }

    /// Registry relation name for this relationship's link
    pub fn link_relation(&self) -> &str {
        self.link_template.as_deref().unwrap_or(&self.name)
    }

    /// Embedded descriptors in declaration order
    pub fn embedded(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.data
            .iter()
            .flat_map(|data| data.members().iter())
            .filter_map(Related::embedded)
    }
}

/// Format-agnostic description of one resource instance
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub resource_type: String,
    pub id: String,
    pub attributes: Map<String, Value>,
    pub relationships: Vec<RelationshipDescriptor>,
}

impl ResourceDescriptor {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: Map::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Replace all attributes with the fields of a JSON object
    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier::new(self.resource_type.clone(), self.id.clone())
    }

    /// Check every invariant, recursing into embedded descriptors.
    ///
    /// Builders call this before rendering anything, so a malformed
    /// descriptor never produces a partial document.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| HypermediaError::malformed(&self.resource_type, &self.id, reason);

        if self.resource_type.trim().is_empty() {
            return Err(fail("resource type is empty".to_string()));
        }
        if self.id.trim().is_empty() {
            return Err(fail("id is empty".to_string()));
        }

        for (key, value) in &self.attributes {
            if RESERVED_ATTRIBUTES.contains(&key.as_str()) {
                return Err(fail(format!("attribute '{}' is reserved", key)));
            }
            if contains_resource_object(value) {
                return Err(fail(format!(
                    "attribute '{}' holds a nested resource object; express it as a relationship",
                    key
                )));
            }
        }

        let mut names = HashSet::new();
        for relationship in &self.relationships {
            if relationship.name.trim().is_empty() {
                return Err(fail("relationship name is empty".to_string()));
            }
            if !names.insert(relationship.name.as_str()) {
                return Err(fail(format!(
                    "relationship '{}' declared more than once",
                    relationship.name
                )));
            }
            if self.attributes.contains_key(&relationship.name) {
                return Err(fail(format!(
                    "'{}' is both an attribute and a relationship",
                    relationship.name
                )));
            }

            match (&relationship.cardinality, &relationship.data) {
                (_, None) => {}
                (Cardinality::ToOne, Some(RelatedData::One(_)))
                | (Cardinality::ToMany, Some(RelatedData::Many(_))) => {}
                (Cardinality::ToOne, Some(RelatedData::Many(_))) => {
                    return Err(fail(format!(
                        "relationship '{}' is to-one but carries a sequence",
                        relationship.name
                    )));
                }
                (Cardinality::ToMany, Some(RelatedData::One(_))) => {
                    return Err(fail(format!(
                        "relationship '{}' is to-many but carries a single resource",
                        relationship.name
                    )));
                }
            }

            if let Some(data) = &relationship.data {
                for related in data.members() {
                    match related {
                        Related::Identifier(identifier) => {
                            if identifier.resource_type.trim().is_empty()
                                || identifier.id.trim().is_empty()
                            {
                                return Err(fail(format!(
                                    "relationship '{}' references an identifier with empty type or id",
                                    relationship.name
                                )));
                            }
                        }
                        Related::Embedded(descriptor) => descriptor.validate()?,
                    }
                }
            }
        }

        Ok(())
    }
}

/// Detect a `{type, id, ...}` object anywhere inside an attribute value
fn contains_resource_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            let looks_like_resource =
                matches!(map.get("type"), Some(Value::String(_))) && map.contains_key("id");
            looks_like_resource || map.values().any(contains_resource_object)
        }
        Value::Array(items) => items.iter().any(contains_resource_object),
        _ => false,
    }
}

/// A resolved collection, e.g. the target of an order's `items` link
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    /// Type of the members, also the HAL `_embedded` key
    pub resource_type: String,
    /// URL the collection was requested at
    pub href: String,
    pub members: Vec<ResourceDescriptor>,
}

impl CollectionDescriptor {
    pub fn new(
        resource_type: impl Into<String>,
        href: impl Into<String>,
        members: Vec<ResourceDescriptor>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            href: href.into(),
            members,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for member in &self.members {
            if member.resource_type != self.resource_type {
                return Err(HypermediaError::malformed(
                    &member.resource_type,
                    &member.id,
                    format!("member of a '{}' collection", self.resource_type),
                ));
            }
            member.validate()?;
        }
        Ok(())
    }
}
