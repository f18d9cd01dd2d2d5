//! URL templates with `{name}` placeholders
//!
//! Templates are parsed once when the registry is built. Expansion
//! percent-encodes each substituted value; reverse matching splits on `/`
//! and binds placeholder segments, which is how HAL documents (which carry
//! no `type`/`id` fields) are identified from their self links.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{HypermediaError, Result};

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param(String),
}

/// A parsed URL template such as `/orders/{id}/items`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate {
    raw: String,
    parts: Vec<Part>,
}

impl LinkTemplate {
    /// Parse a template, rejecting unbalanced braces and empty names
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| HypermediaError::InvalidTemplate {
            template: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = Vec::new();
        let mut rest = raw;

        while !rest.is_empty() {
            match rest.find(['{', '}']) {
                None => {
                    parts.push(Part::Literal(rest.to_string()));
                    break;
                }
                Some(pos) if rest[pos..].starts_with('}') => {
                    return Err(invalid("unmatched '}'"));
                }
                Some(open) => {
                    if open > 0 {
                        parts.push(Part::Literal(rest[..open].to_string()));
                    }
                    let after = &rest[open + 1..];
                    let close = after.find('}').ok_or_else(|| invalid("unclosed '{'"))?;
                    let name = &after[..close];
                    if name.is_empty() {
                        return Err(invalid("empty placeholder name"));
                    }
                    if name.contains('{') {
                        return Err(invalid("nested '{'"));
                    }
                    parts.push(Part::Param(name.to_string()));
                    rest = &after[close + 1..];
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in template order
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Param(name) => Some(name.as_str()),
            Part::Literal(_) => None,
        })
    }

    /// Substitute every placeholder from `values`
    pub fn expand(&self, values: &BTreeMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(self.raw.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Param(name) => {
                    let value =
                        values
                            .get(name)
                            .ok_or_else(|| HypermediaError::MissingTemplateParameter {
                                template: self.raw.clone(),
                                parameter: name.clone(),
                            })?;
                    out.push_str(&urlencoding::encode(value));
                }
            }
        }
        Ok(out)
    }

    /// Match a URL path against this template.
    ///
    /// Matching is segment-wise: every `/`-separated template segment must
    /// either be literal text equal to the path segment, or exactly one
    /// placeholder, which captures the (percent-decoded) path segment.
    /// Segments mixing literal text and placeholders never match.
    pub fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let template_segments: Vec<&str> = split_segments(&self.raw);
        let path_segments: Vec<&str> = split_segments(path);

        if template_segments.len() != path_segments.len() {
            return None;
        }

        let mut captures = BTreeMap::new();
        for (tseg, pseg) in template_segments.iter().zip(path_segments.iter()) {
            match single_placeholder(tseg) {
                Some(name) => {
                    if pseg.is_empty() {
                        return None;
                    }
                    let decoded = urlencoding::decode(pseg).ok()?.into_owned();
                    captures.insert(name.to_string(), decoded);
                }
                None if tseg.contains('{') => return None,
                None => {
                    if tseg != pseg {
                        return None;
                    }
                }
            }
        }
        Some(captures)
    }
}

impl fmt::Display for LinkTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}

fn single_placeholder(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(['{', '}']) {
        None
    } else {
        Some(inner)
    }
}
