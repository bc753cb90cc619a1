//! Stateless resolution of virtual catalog paths.
//!
//! Every resolution is a fresh depth-first walk from the configured root
//! URLs: no index, no cache. The attempted-URL set is scoped to one
//! top-level [`Resolver::resolve`] call and doubles as the cycle breaker:
//! any URL seen twice anywhere in the walk terminates that branch without a
//! second fetch, which also collapses diamonds.

use crate::catalog::path::{could_lead_to, is_ancestor_of, matches_wanted, TrailingPolicy};
use crate::catalog::{CatalogNode, ResolvedNode};
use crate::error::CatalogError;
use crate::fetch::NodeFetcher;
use tracing::{debug, warn};

/// One ancestor on the way to a resolved node: `(name, title, path)`.
/// The terminal node itself is not included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub name: String,
    pub title: String,
    pub path: String,
}

/// Outcome of one resolution call.
#[derive(Debug)]
pub struct Resolution {
    /// The matched node, or `None` when every root was exhausted.
    pub node: Option<ResolvedNode>,
    /// Ancestors within the browsed namespace, root-most first.
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Every URL fetched (or refused as a cycle), in attempt order.
    pub attempted: Vec<String>,
}

pub struct Resolver<'a> {
    fetcher: &'a dyn NodeFetcher,
    roots: Vec<String>,
    namespace: String,
    policy: TrailingPolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(fetcher: &'a dyn NodeFetcher, roots: Vec<String>, namespace: String) -> Self {
        Resolver {
            fetcher,
            roots,
            namespace,
            policy: TrailingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TrailingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Turn a user-supplied identifier into a full virtual path.
    ///
    /// Direct URLs and full `tag:` paths pass through; anything else is
    /// taken relative to the configured namespace, and an empty request
    /// means the namespace root itself.
    pub fn normalize_request(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return self.namespace.clone();
        }
        if is_direct_url(trimmed) || trimmed.starts_with("tag:") {
            return trimmed.to_string();
        }
        let rel = trimmed.strip_prefix('/').unwrap_or(trimmed);
        format!("{}:/{}", self.namespace, rel)
    }

    /// Walk the catalog graph for `request`: a relative path, a full
    /// virtual path, or a direct URL (see [`normalize_request`](Self::normalize_request)).
    pub fn resolve(&self, request: &str) -> Resolution {
        let wanted = self.normalize_request(request);
        let wanted = wanted.as_str();
        let mut attempted = Vec::new();

        if is_direct_url(wanted) {
            // No ancestry is known for a direct fetch; the resolved path
            // stays empty and there is nothing to recurse into.
            attempted.push(wanted.to_string());
            let node = match self.fetcher.fetch(wanted) {
                Ok(node) => Some(ResolvedNode {
                    node,
                    source_url: wanted.to_string(),
                    resolved_path: String::new(),
                }),
                Err(e) => {
                    debug!(%e, "direct URL fetch failed");
                    None
                }
            };
            return Resolution {
                node,
                breadcrumbs: Vec::new(),
                attempted,
            };
        }

        let mut breadcrumbs = Vec::new();
        for root in &self.roots {
            if let Some(found) =
                self.descend(root, "", wanted, &mut attempted, &mut breadcrumbs)
            {
                return Resolution {
                    node: Some(found),
                    breadcrumbs,
                    attempted,
                };
            }
        }
        Resolution {
            node: None,
            breadcrumbs: Vec::new(),
            attempted,
        }
    }

    /// Like [`resolve`](Self::resolve) but exhaustion is an error carrying
    /// the attempted-URL trail.
    pub fn resolve_required(&self, wanted: &str) -> Result<ResolvedNode, CatalogError> {
        let resolution = self.resolve(wanted);
        resolution.node.ok_or(CatalogError::NotFound {
            path: self.normalize_request(wanted),
            attempted: resolution.attempted,
        })
    }

    fn descend(
        &self,
        url: &str,
        path: &str,
        wanted: &str,
        attempted: &mut Vec<String>,
        breadcrumbs: &mut Vec<Breadcrumb>,
    ) -> Option<ResolvedNode> {
        if attempted.iter().any(|u| u == url) {
            // Revisiting a URL anywhere in this call's walk means a loop
            // (or a diamond); either way the branch is done.
            warn!(url, "cycle detected in catalog, branch abandoned");
            return None;
        }
        attempted.push(url.to_string());

        let node = match self.fetcher.fetch(url) {
            Ok(node) => node,
            Err(e) => {
                debug!(%e, "candidate unavailable");
                return None;
            }
        };
        let sep = node.effective_separator().to_string();

        if matches_wanted(path, wanted, &sep, self.policy) {
            return Some(ResolvedNode {
                node,
                source_url: url.to_string(),
                resolved_path: path.to_string(),
            });
        }

        if !is_ancestor_of(path, wanted, &sep) {
            // Not the node and not on the way to it.
            return None;
        }

        for (key, entry) in &node.children {
            let sub_path = format!("{}{}{}", path, sep, key);
            if sub_path != wanted && !could_lead_to(&sub_path, wanted) {
                continue;
            }
            for sub_url in &entry.urls {
                // Only nodes inside the browsed namespace contribute a
                // breadcrumb; external hierarchies are passed through.
                let in_namespace = path.starts_with(self.namespace.as_str());
                if in_namespace {
                    breadcrumbs.push(Breadcrumb {
                        name: node.name.clone().unwrap_or_else(|| key.clone()),
                        title: node.title.clone().unwrap_or_default(),
                        path: path.to_string(),
                    });
                }
                if let Some(found) =
                    self.descend(sub_url, &sub_path, wanted, attempted, breadcrumbs)
                {
                    return Some(found);
                }
                if in_namespace {
                    breadcrumbs.pop();
                }
            }
        }

        None
    }
}

fn is_direct_url(wanted: &str) -> bool {
    let low = wanted.to_ascii_lowercase();
    low.starts_with("http://") || low.starts_with("https://") || low.starts_with("file://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Unavailable;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory fetcher that counts fetches per URL.
    struct MapFetcher {
        docs: HashMap<String, Value>,
        counts: RefCell<HashMap<String, usize>>,
    }

    impl MapFetcher {
        fn new(docs: Vec<(&str, Value)>) -> Self {
            MapFetcher {
                docs: docs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                counts: RefCell::new(HashMap::new()),
            }
        }

        fn count(&self, url: &str) -> usize {
            self.counts.borrow().get(url).copied().unwrap_or(0)
        }
    }

    impl NodeFetcher for MapFetcher {
        fn fetch(&self, url: &str) -> Result<CatalogNode, Unavailable> {
            *self.counts.borrow_mut().entry(url.to_string()).or_insert(0) += 1;
            let value = self
                .docs
                .get(url)
                .cloned()
                .ok_or_else(|| Unavailable::new(url, "not in fixture"))?;
            CatalogNode::from_value(value, url)
        }
    }

    const NS: &str = "tag:das2.org,2012:site";

    fn root_doc() -> Value {
        // Root index: keys are full namespace tags, joined with no separator.
        json!({
            "type": "Catalog",
            "name": "das2 root",
            "title": "Root",
            "separator": null,
            "catalog": {
                NS: { "urls": ["http://cat/site.json"] }
            }
        })
    }

    fn site_doc() -> Value {
        json!({
            "type": "Catalog",
            "name": "site",
            "title": "Site catalog",
            "separator": ":/",
            "catalog": {
                "uiowa": { "urls": ["http://cat/uiowa.json"] }
            }
        })
    }

    fn uiowa_doc() -> Value {
        json!({
            "type": "Catalog",
            "name": "uiowa",
            "title": "U. Iowa",
            "catalog": {
                "juno": { "urls": ["http://cat/dead.json", "http://cat/juno.json"] }
            }
        })
    }

    fn juno_doc() -> Value {
        json!({
            "type": "Collection",
            "name": "juno",
            "title": "Juno waves",
            "sources": {
                "das2": { "urls": ["http://cat/juno-das2.json"] }
            }
        })
    }

    fn fixture() -> MapFetcher {
        MapFetcher::new(vec![
            ("http://cat/index.json", root_doc()),
            ("http://cat/site.json", site_doc()),
            ("http://cat/uiowa.json", uiowa_doc()),
            ("http://cat/juno.json", juno_doc()),
            (
                "http://cat/juno-das2.json",
                json!({"type": "HttpStreamSrc", "name": "Das2/2.2 Source"}),
            ),
        ])
    }

    fn resolver(fetcher: &MapFetcher) -> Resolver<'_> {
        Resolver::new(
            fetcher,
            vec!["http://cat/index.json".to_string()],
            NS.to_string(),
        )
    }

    #[test]
    fn test_resolves_nested_collection() {
        let fetcher = fixture();
        let r = resolver(&fetcher);
        let wanted = format!("{}:/uiowa/juno", NS);
        let res = r.resolve(&wanted);

        let node = res.node.expect("should resolve");
        assert_eq!(node.resolved_path, wanted);
        assert_eq!(node.source_url, "http://cat/juno.json");

        // Root index is outside the namespace: no breadcrumb for it.
        let names: Vec<&str> = res.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["site", "uiowa"]);
    }

    #[test]
    fn test_first_reachable_url_wins() {
        let fetcher = fixture();
        let r = resolver(&fetcher);
        let wanted = format!("{}:/uiowa/juno", NS);
        let res = r.resolve(&wanted);
        assert!(res.node.is_some());
        // The dead candidate was attempted before the live one.
        let dead_pos = res.attempted.iter().position(|u| u.ends_with("dead.json"));
        let live_pos = res.attempted.iter().position(|u| u.ends_with("juno.json"));
        assert!(dead_pos.unwrap() < live_pos.unwrap());
    }

    #[test]
    fn test_not_found_trail_stops_at_deepest_ancestor() {
        let fetcher = fixture();
        let r = resolver(&fetcher);
        let wanted = format!("{}:/uiowa/juno/nothing", NS);
        let res = r.resolve(&wanted);
        assert!(res.node.is_none());
        assert!(res.breadcrumbs.is_empty());
        assert!(res
            .attempted
            .iter()
            .any(|u| u == "http://cat/juno-das2.json" || u == "http://cat/juno.json"));
        // Nothing below the deepest reachable ancestor was invented.
        assert!(!res.attempted.iter().any(|u| u.contains("nothing")));
    }

    #[test]
    fn test_missing_branch_never_fetches_below() {
        let fetcher = fixture();
        let r = resolver(&fetcher);
        let wanted = format!("{}:/cassini", NS);
        let res = r.resolve(&wanted);
        assert!(res.node.is_none());
        assert_eq!(fetcher.count("http://cat/uiowa.json"), 0);
    }

    #[test]
    fn test_cycle_terminates() {
        // a -> b -> a: must terminate and must not re-fetch a.
        let fetcher = MapFetcher::new(vec![
            (
                "http://cat/a.json",
                json!({
                    "type": "Catalog", "name": "a", "separator": null,
                    "catalog": { NS: { "urls": ["http://cat/b.json"] } }
                }),
            ),
            (
                "http://cat/b.json",
                json!({
                    "type": "Catalog", "name": "b", "title": "b",
                    "separator": ":/",
                    "catalog": { "x": { "urls": ["http://cat/a.json"] } }
                }),
            ),
        ]);
        let r = Resolver::new(
            &fetcher,
            vec!["http://cat/a.json".to_string()],
            NS.to_string(),
        );
        let res = r.resolve(&format!("{}:/x/y", NS));
        assert!(res.node.is_none());
        assert_eq!(fetcher.count("http://cat/a.json"), 1);
        assert_eq!(fetcher.count("http://cat/b.json"), 1);
    }

    #[test]
    fn test_diamond_second_encounter_not_refetched() {
        // Two children both point at the same URL.
        let fetcher = MapFetcher::new(vec![
            (
                "http://cat/root.json",
                json!({
                    "type": "Catalog", "name": "root", "separator": null,
                    "catalog": { NS: { "urls": ["http://cat/mid.json"] } }
                }),
            ),
            (
                "http://cat/mid.json",
                json!({
                    "type": "Catalog", "name": "site", "title": "Site",
                    "separator": ":/",
                    "catalog": {
                        "a": { "urls": ["http://cat/shared.json"] },
                        "ab": { "urls": ["http://cat/shared.json"] }
                    }
                }),
            ),
            (
                "http://cat/shared.json",
                json!({ "type": "Catalog", "name": "shared", "catalog": {} }),
            ),
        ]);
        let r = Resolver::new(
            &fetcher,
            vec!["http://cat/root.json".to_string()],
            NS.to_string(),
        );
        // "a" could lead to ":/ab..." textually, so both children are tried;
        // the shared URL must only be fetched once.
        let res = r.resolve(&format!("{}:/ab/missing", NS));
        assert!(res.node.is_none());
        assert_eq!(fetcher.count("http://cat/shared.json"), 1);
    }

    #[test]
    fn test_direct_url_bypasses_walk() {
        let fetcher = fixture();
        let r = resolver(&fetcher);
        let res = r.resolve("http://cat/juno.json");
        let node = res.node.expect("direct fetch should succeed");
        assert_eq!(node.resolved_path, "");
        assert!(res.breadcrumbs.is_empty());
        assert_eq!(res.attempted, vec!["http://cat/juno.json"]);
        assert_eq!(fetcher.count("http://cat/index.json"), 0);
    }

    #[test]
    fn test_normalize_request() {
        let fetcher = fixture();
        let r = resolver(&fetcher);
        assert_eq!(r.normalize_request(""), NS);
        assert_eq!(r.normalize_request("/"), NS);
        assert_eq!(
            r.normalize_request("uiowa/juno"),
            format!("{}:/uiowa/juno", NS)
        );
        assert_eq!(r.normalize_request("tag:other,2020:x"), "tag:other,2020:x");
        assert_eq!(
            r.normalize_request("http://cat/juno.json"),
            "http://cat/juno.json"
        );
    }

    #[test]
    fn test_resolve_required_carries_trail() {
        let fetcher = fixture();
        let r = resolver(&fetcher);
        let err = r
            .resolve_required(&format!("{}:/cassini", NS))
            .unwrap_err();
        match err {
            CatalogError::NotFound { attempted, .. } => {
                assert!(!attempted.is_empty());
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
