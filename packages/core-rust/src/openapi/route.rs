//! Compiled path templates for matching requests to documented operations.

use std::collections::BTreeMap;

use super::document::{DocumentError, OpenApiDocument};
use crate::schema::{PathParams, SchemaDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// One documented (method, path template) operation.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    method: &'static str,
    template: String,
    segments: Vec<Segment>,
    descriptor: SchemaDescriptor,
}

impl RouteEntry {
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.method
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[must_use]
    pub fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    fn match_segments(&self, parts: &[&str]) -> Option<PathParams> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(PathParams(params))
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub descriptor: &'a SchemaDescriptor,
    pub params: PathParams,
}

/// Route table built from an OpenAPI document.
///
/// Entries are ordered so that templates with more literal segments are tried
/// first (`/inventory/low-stock` before `/inventory/{itemId}`), ties broken by
/// template text.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    base: Vec<String>,
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Compiles every operation of the document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidTemplate`] for templates with malformed
    /// parameter segments.
    pub fn from_document(doc: &OpenApiDocument) -> Result<Self, DocumentError> {
        let mut entries = Vec::new();
        for (template, item) in &doc.paths {
            let segments = parse_template(template)?;
            for (method, op) in item.operations() {
                entries.push(RouteEntry {
                    method,
                    template: template.clone(),
                    segments: segments.clone(),
                    descriptor: op.descriptor.clone(),
                });
            }
        }
        entries.sort_by(|a, b| {
            b.literal_count()
                .cmp(&a.literal_count())
                .then_with(|| a.template.cmp(&b.template))
        });

        let base = split_path(doc.base_path())
            .into_iter()
            .map(str::to_string)
            .collect();

        tracing::debug!(
            routes = entries.len(),
            base_path = doc.base_path(),
            "compiled OpenAPI route table"
        );

        Ok(Self { base, entries })
    }

    /// Finds the operation for `method` and a request `path` (no query string).
    #[must_use]
    pub fn lookup(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let parts = split_path(path);
        let rest = strip_base(&self.base, &parts)?;
        self.entries
            .iter()
            .filter(|entry| entry.method.eq_ignore_ascii_case(method))
            .find_map(|entry| {
                entry.match_segments(rest).map(|params| RouteMatch {
                    descriptor: &entry.descriptor,
                    params,
                })
            })
    }

    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn strip_base<'p, 'a>(base: &[String], parts: &'p [&'a str]) -> Option<&'p [&'a str]> {
    if parts.len() < base.len() {
        return None;
    }
    let (head, rest) = parts.split_at(base.len());
    head.iter()
        .zip(base)
        .all(|(part, expected)| part == expected)
        .then_some(rest)
}

fn parse_template(template: &str) -> Result<Vec<Segment>, DocumentError> {
    let invalid = |reason: &str| DocumentError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    split_path(template)
        .into_iter()
        .map(|segment| {
            if let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if inner.is_empty() || inner.contains(['{', '}']) {
                    return Err(invalid("empty or nested parameter name"));
                }
                Ok(Segment::Param(inner.to_string()))
            } else if segment.contains(['{', '}']) {
                Err(invalid("parameters must span a whole segment"))
            } else {
                Ok(Segment::Literal(segment.to_string()))
            }
        })
        .collect()
}
