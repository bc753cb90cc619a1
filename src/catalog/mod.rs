//! Catalog node data model.
//!
//! Catalog documents are loosely shaped JSON objects linked by URL. The shape
//! is validated once here, at the parse boundary: the required `type` member
//! selects the node kind, and the kind selects which member (`catalog` or
//! `sources`) holds the child index. Everything else is retained verbatim in
//! the raw document so unrecognized, hand-authored fields survive round trips.

pub mod path;

use crate::error::Unavailable;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Default virtual-path separator when a node does not carry one.
pub const DEFAULT_SEPARATOR: &str = "/";

/// Node kind, from the required `type` member of a catalog document.
///
/// Unrecognized type strings are preserved rather than rejected; the
/// resolver can still hand such a node back to the caller, it just will
/// not descend into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Catalog,
    Collection,
    HttpStreamSrc,
    Other(String),
}

impl NodeKind {
    pub fn from_type(s: &str) -> Self {
        match s {
            "Catalog" => NodeKind::Catalog,
            "Collection" => NodeKind::Collection,
            "HttpStreamSrc" => NodeKind::HttpStreamSrc,
            other => NodeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Catalog => "Catalog",
            NodeKind::Collection => "Collection",
            NodeKind::HttpStreamSrc => "HttpStreamSrc",
            NodeKind::Other(s) => s.as_str(),
        }
    }

    /// JSON member holding the child index for this kind, if any.
    pub fn child_index_key(&self) -> Option<&'static str> {
        match self {
            NodeKind::Catalog => Some("catalog"),
            NodeKind::Collection => Some("sources"),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a node's child index: where the child may be fetched from.
///
/// `urls` is an ordered candidate list; the first reachable one wins.
#[derive(Debug, Clone, Default)]
pub struct ChildEntry {
    pub urls: Vec<String>,
    pub kind: Option<NodeKind>,
    pub name: Option<String>,
    pub title: Option<String>,
}

/// A parsed catalog document, independent of where it was fetched from.
#[derive(Debug, Clone)]
pub struct CatalogNode {
    pub kind: NodeKind,
    pub name: Option<String>,
    pub title: Option<String>,
    /// `None` means the member was absent (default separator applies);
    /// `Some("")` means an explicit JSON `null` (children concatenate with
    /// no separator, as the root index does for full namespace tags).
    pub separator: Option<String>,
    /// Child index keyed by the short child key. Empty for leaf kinds.
    pub children: BTreeMap<String, ChildEntry>,
    /// The complete document, for pass-through of `protocol`, `interface`
    /// and any hand-authored members.
    pub raw: Map<String, Value>,
}

impl CatalogNode {
    /// Validate a fetched JSON value into a typed node.
    ///
    /// The only hard requirement is a string `type` member. A missing or
    /// malformed child index is treated as "no children" (a dead end for
    /// the resolver), not an error.
    pub fn from_value(value: Value, url: &str) -> Result<Self, Unavailable> {
        let raw = match value {
            Value::Object(map) => map,
            other => {
                return Err(Unavailable::new(
                    url,
                    format!("expected a JSON object, got {}", json_type_name(&other)),
                ))
            }
        };

        let kind = match raw.get("type").and_then(Value::as_str) {
            Some(s) => NodeKind::from_type(s),
            None => return Err(Unavailable::new(url, "missing required 'type' member")),
        };

        let separator = match raw.get("separator") {
            None => None,
            Some(Value::Null) => Some(String::new()),
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => Some(DEFAULT_SEPARATOR.to_string()),
        };

        let children = kind
            .child_index_key()
            .and_then(|key| raw.get(key))
            .and_then(Value::as_object)
            .map(parse_child_index)
            .unwrap_or_default();

        Ok(CatalogNode {
            kind,
            name: raw.get("name").and_then(Value::as_str).map(str::to_string),
            title: raw.get("title").and_then(Value::as_str).map(str::to_string),
            separator,
            children,
            raw,
        })
    }

    /// Separator used when joining this node's path with a child key.
    pub fn effective_separator(&self) -> &str {
        self.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR)
    }
}

/// A catalog node plus the walk-derived attributes its parent assigned.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub node: CatalogNode,
    /// URL the document was actually loaded from.
    pub source_url: String,
    /// Virtual path assigned during the walk; empty for a root document or
    /// a direct-URL fetch (no ancestry known).
    pub resolved_path: String,
}

impl ResolvedNode {
    /// Display name: the node's own name, else the last path segment.
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.node.name.as_deref() {
            return name;
        }
        match self.resolved_path.rsplit('/').next() {
            Some(seg) if !seg.is_empty() => seg,
            _ => self.resolved_path.as_str(),
        }
    }
}

fn parse_child_index(index: &Map<String, Value>) -> BTreeMap<String, ChildEntry> {
    let mut children = BTreeMap::new();
    for (key, entry) in index {
        let obj = match entry.as_object() {
            Some(o) => o,
            None => continue,
        };
        let urls = obj
            .get("urls")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        children.insert(
            key.clone(),
            ChildEntry {
                urls,
                kind: obj
                    .get("type")
                    .and_then(Value::as_str)
                    .map(NodeKind::from_type),
                name: obj.get("name").and_then(Value::as_str).map(str::to_string),
                title: obj
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        );
    }
    children
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_catalog_node() {
        let doc = json!({
            "type": "Catalog",
            "name": "uiowa",
            "title": "University of Iowa",
            "catalog": {
                "juno": { "urls": ["http://example.org/juno.json"], "type": "Catalog" },
                "voyager": { "urls": [] }
            }
        });
        let node = CatalogNode::from_value(doc, "http://example.org/uiowa.json").unwrap();
        assert_eq!(node.kind, NodeKind::Catalog);
        assert_eq!(node.name.as_deref(), Some("uiowa"));
        assert_eq!(node.effective_separator(), "/");
        assert_eq!(node.children.len(), 2);
        assert_eq!(
            node.children["juno"].urls,
            vec!["http://example.org/juno.json"]
        );
        assert!(node.children["voyager"].urls.is_empty());
    }

    #[test]
    fn test_null_separator_means_empty() {
        let doc = json!({
            "type": "Catalog",
            "separator": null,
            "catalog": {}
        });
        let node = CatalogNode::from_value(doc, "root").unwrap();
        assert_eq!(node.effective_separator(), "");
    }

    #[test]
    fn test_collection_uses_sources_index() {
        let doc = json!({
            "type": "Collection",
            "sources": {
                "das2": { "urls": ["http://example.org/das2.json"] }
            }
        });
        let node = CatalogNode::from_value(doc, "col").unwrap();
        assert_eq!(node.kind, NodeKind::Collection);
        assert!(node.children.contains_key("das2"));
    }

    #[test]
    fn test_missing_type_is_unavailable() {
        let err = CatalogNode::from_value(json!({"name": "x"}), "u").unwrap_err();
        assert!(err.reason.contains("type"));
    }

    #[test]
    fn test_non_object_is_unavailable() {
        let err = CatalogNode::from_value(json!([1, 2]), "u").unwrap_err();
        assert!(err.reason.contains("array"));
    }

    #[test]
    fn test_unknown_kind_preserved() {
        let doc = json!({"type": "FileAggregation"});
        let node = CatalogNode::from_value(doc, "u").unwrap();
        assert_eq!(node.kind, NodeKind::Other("FileAggregation".to_string()));
        assert!(node.kind.child_index_key().is_none());
        assert!(node.children.is_empty());
    }
}
