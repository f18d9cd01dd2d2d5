//! Parsing fetched documents back into nodes, edges and links
//!
//! Format is detected from the document shape: `_links`/`_embedded`
//! means HAL, `data` means JSON:API. When a document carries both shapes
//! the content type decides.

use serde_json::{Map, Value};
use url::Url;

use crate::discovery::fetch::FetchedDocument;
use crate::discovery::graph::{Edge, ResourceKey};
use crate::discovery::keys::KeyExtractor;
use crate::document::hal::{EMBEDDED_KEY, LINKS_KEY};
use crate::document::HypermediaFormat;
use crate::error::DiscoveryError;
use crate::links::SELF_RELATION;

/// One resource found in a document
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNode {
    pub key: ResourceKey,
    pub attributes: Map<String, Value>,
    pub self_url: Option<Url>,
    /// False for bare `{type, id}` sightings that carry no content
    pub complete: bool,
}

/// Relation from a resource to a URL
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLink {
    pub from: ResourceKey,
    pub relation: String,
    pub href: Url,
}

/// Everything the walker needs from one fetched document
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub format: HypermediaFormat,
    pub nodes: Vec<ParsedNode>,
    /// The resource the document itself represents
    pub primary: Option<ResourceKey>,
    /// Members, when the document is a collection
    pub collection: Option<Vec<ResourceKey>>,
    pub edges: Vec<Edge>,
    pub links: Vec<ParsedLink>,
    /// Outgoing URLs worth fetching, in document order
    pub follow: Vec<Url>,
}

impl ParsedDocument {
    fn empty(format: HypermediaFormat) -> Self {
        Self {
            format,
            nodes: Vec::new(),
            primary: None,
            collection: None,
            edges: Vec::new(),
            links: Vec::new(),
            follow: Vec::new(),
        }
    }
}

/// Strip the fragment; `Url` already lowercases scheme and host
pub fn normalize_url(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Decide which format a JSON body is in
pub fn detect_format(body: &Value, content_type: Option<&str>) -> Option<HypermediaFormat> {
    let object = body.as_object()?;
    let hal_shape = object.contains_key(LINKS_KEY) || object.contains_key(EMBEDDED_KEY);
    let json_api_shape = object.contains_key("data");

    match (hal_shape, json_api_shape) {
        (true, false) => Some(HypermediaFormat::Hal),
        (false, true) => Some(HypermediaFormat::JsonApi),
        (true, true) => Some(
            content_type
                .and_then(HypermediaFormat::from_content_type)
                .unwrap_or(HypermediaFormat::Hal),
        ),
        (false, false) => None,
    }
}

/// Parse a fetched document served at `url`
pub fn parse_document(
    url: &Url,
    fetched: &FetchedDocument,
    keys: &dyn KeyExtractor,
) -> Result<ParsedDocument, DiscoveryError> {
    let body: Value =
        serde_json::from_str(&fetched.body).map_err(|source| DiscoveryError::InvalidJson {
            url: url.to_string(),
            source,
        })?;

    let unrecognized = |reason: &str| DiscoveryError::UnrecognizedFormat {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let format = detect_format(&body, fetched.content_type.as_deref())
        .ok_or_else(|| unrecognized("no _links, _embedded or data member"))?;
    let root = body
        .as_object()
        .ok_or_else(|| unrecognized("document is not a JSON object"))?;

    match format {
        HypermediaFormat::Hal => Ok(HalParser::new(url, keys).parse(root)),
        HypermediaFormat::JsonApi => JsonApiParser::new(url).parse(root).map_err(|reason| unrecognized(&reason)),
    }
}

fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    match base.join(href) {
        Ok(url) => Some(normalize_url(url)),
        Err(e) => {
            tracing::debug!(base = %base, href, error = %e, "Skipping unresolvable href");
            None
        }
    }
}

struct HalParser<'a> {
    base: &'a Url,
    keys: &'a dyn KeyExtractor,
    out: ParsedDocument,
}

impl<'a> HalParser<'a> {
    fn new(base: &'a Url, keys: &'a dyn KeyExtractor) -> Self {
        Self {
            base,
            keys,
            out: ParsedDocument::empty(HypermediaFormat::Hal),
        }
    }

    fn parse(mut self, root: &Map<String, Value>) -> ParsedDocument {
        let (key, members) = self.resource(root);
        match key {
            Some(key) => self.out.primary = Some(key),
            None => self.out.collection = Some(members),
        }
        self.out
    }

    /// Link objects: `{"href": ..}` or an array of them. Templated links
    /// cannot be fetched as-is and are skipped.
    fn hrefs(&self, value: &Value) -> Vec<Url> {
        let objects: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        objects
            .into_iter()
            .filter(|link| link.get("templated").and_then(Value::as_bool) != Some(true))
            .filter_map(|link| link.get("href").and_then(Value::as_str))
            .filter_map(|href| resolve_href(self.base, href))
            .collect()
    }

    /// Returns this resource's key and the keys of everything it embeds
    fn resource(&mut self, object: &Map<String, Value>) -> (Option<ResourceKey>, Vec<ResourceKey>) {
        let links = object.get(LINKS_KEY).and_then(Value::as_object);

        let self_url = links
            .and_then(|links| links.get(SELF_RELATION))
            .and_then(|value| self.hrefs(value).into_iter().next());
        let key = self_url.as_ref().and_then(|url| self.keys.extract(url));

        if let Some(key) = &key {
            let attributes: Map<String, Value> = object
                .iter()
                .filter(|(k, _)| k.as_str() != LINKS_KEY && k.as_str() != EMBEDDED_KEY)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.out.nodes.push(ParsedNode {
                key: key.clone(),
                attributes,
                self_url: self_url.clone(),
                complete: true,
            });
        }

        if let Some(links) = links {
            for (relation, value) in links {
                if relation == SELF_RELATION || relation == "curies" {
                    continue;
                }
                for href in self.hrefs(value) {
                    self.out.follow.push(href.clone());
                    if let Some(from) = &key {
                        self.out.links.push(ParsedLink {
                            from: from.clone(),
                            relation: relation.clone(),
                            href,
                        });
                    }
                }
            }
        }

        let mut members = Vec::new();
        if let Some(embedded) = object.get(EMBEDDED_KEY).and_then(Value::as_object) {
            for (relation, value) in embedded {
                let children: Vec<&Map<String, Value>> = match value {
                    Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
                    Value::Object(child) => vec![child],
                    _ => Vec::new(),
                };
                for child in children {
                    let (child_key, _) = self.resource(child);
                    if let Some(child_key) = child_key {
                        if let Some(from) = &key {
                            self.out
                                .edges
                                .push(Edge::new(from.clone(), relation.clone(), child_key.clone()));
                        }
                        members.push(child_key);
                    }
                }
            }
        }

        (key, members)
    }
}

struct JsonApiParser<'a> {
    base: &'a Url,
    out: ParsedDocument,
}

impl<'a> JsonApiParser<'a> {
    fn new(base: &'a Url) -> Self {
        Self {
            base,
            out: ParsedDocument::empty(HypermediaFormat::JsonApi),
        }
    }

    fn parse(mut self, root: &Map<String, Value>) -> Result<ParsedDocument, String> {
        match root.get("data") {
            Some(Value::Object(resource)) => {
                self.out.primary = Some(self.resource(resource)?);
            }
            Some(Value::Array(resources)) => {
                let mut members = Vec::with_capacity(resources.len());
                for resource in resources {
                    let resource = resource
                        .as_object()
                        .ok_or_else(|| "data array holds a non-object".to_string())?;
                    members.push(self.resource(resource)?);
                }
                self.out.collection = Some(members);
            }
            Some(Value::Null) => {}
            _ => return Err("data must be an object, an array or null".to_string()),
        }

        if let Some(included) = root.get("included") {
            let included = included
                .as_array()
                .ok_or_else(|| "included must be an array".to_string())?;
            for resource in included {
                let resource = resource
                    .as_object()
                    .ok_or_else(|| "included holds a non-object".to_string())?;
                self.resource(resource)?;
            }
        }

        // pagination and other top-level links
        if let Some(links) = root.get("links").and_then(Value::as_object) {
            for (name, value) in links {
                if name == SELF_RELATION {
                    continue;
                }
                if let Some(url) = self.link_url(value) {
                    self.out.follow.push(url);
                }
            }
        }

        Ok(self.out)
    }

    /// JSON:API links are either a string or `{"href": ..}`
    fn link_url(&self, value: &Value) -> Option<Url> {
        let href = match value {
            Value::String(s) => s.as_str(),
            Value::Object(link) => link.get("href")?.as_str()?,
            _ => return None,
        };
        resolve_href(self.base, href)
    }

    fn identifier(object: &Map<String, Value>) -> Result<ResourceKey, String> {
        let resource_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "resource object without a string type".to_string())?;
        let id = match object.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(format!("resource of type '{}' without an id", resource_type)),
        };
        Ok(ResourceKey::new(resource_type, id))
    }

    fn resource(&mut self, object: &Map<String, Value>) -> Result<ResourceKey, String> {
        let key = Self::identifier(object)?;
        let self_url = object
            .get("links")
            .and_then(|links| links.get(SELF_RELATION))
            .and_then(|value| self.link_url(value));
        let complete = object.contains_key("attributes") || object.contains_key("relationships");
        let attributes = object
            .get("attributes")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        self.out.nodes.push(ParsedNode {
            key: key.clone(),
            attributes,
            self_url,
            complete,
        });

        if let Some(relationships) = object.get("relationships").and_then(Value::as_object) {
            for (relation, relationship) in relationships {
                self.relationship(&key, relation, relationship)?;
            }
        }

        Ok(key)
    }

    fn relationship(&mut self, from: &ResourceKey, relation: &str, relationship: &Value) -> Result<(), String> {
        let targets: Vec<&Map<String, Value>> = match relationship.get("data") {
            Some(Value::Object(identifier)) => vec![identifier],
            Some(Value::Array(identifiers)) => identifiers.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        };
        for target in targets {
            let to = Self::identifier(target)?;
            self.out.nodes.push(ParsedNode {
                key: to.clone(),
                attributes: Map::new(),
                self_url: None,
                complete: false,
            });
            self.out.edges.push(Edge::new(from.clone(), relation, to));
        }

        if let Some(related) = relationship
            .get("links")
            .and_then(|links| links.get("related"))
            .and_then(|value| self.link_url(value))
        {
            self.out.follow.push(related.clone());
            self.out.links.push(ParsedLink {
                from: from.clone(),
                relation: relation.to_string(),
                href: related,
            });
        }
        Ok(())
    }
}
