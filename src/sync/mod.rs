//! Bottom-up catalog synchronization.
//!
//! Walks the assembled import tree depth-first, merging each node's derived
//! fields into its on-disk document and folding the child's merged result
//! into the parent's child index. Children go first because names and
//! titles picked up from hand-edited files bubble up into the parent's
//! entries. A stream source that cannot be written leaves its collection
//! intact; a broken catalog child aborts the run, since a half-linked
//! index above it would dangle.

pub mod derive;
pub mod merge;

use crate::catalog::NodeKind;
use crate::error::CatalogError;
use crate::import::dsdf::{first_value, prop_is_true, PropMap};
use crate::import::tree::TreeNode;
use merge::{ensure_array, ensure_object, push_unique, WriteMode, WriteOutcome};
use serde_json::{json, Map, Value};
use tracing::{error, warn};

/// Document format version stamped on every synchronized node.
const CATALOG_VERSION: &str = "0.6";

/// Tallies for one synchronization run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub written: usize,
    pub unchanged: usize,
    pub would_write: usize,
    /// Stream sources whose definition was missing or unwritable.
    pub failed: usize,
    /// Nodes above the requested level, visited but never written.
    pub skipped: usize,
}

impl SyncReport {
    fn count(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Updated => self.written += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
            WriteOutcome::WouldUpdate => self.would_write += 1,
        }
    }
}

pub struct Synchronizer {
    mode: WriteMode,
    /// When set, a stable URI is minted for each stream source by
    /// appending its dotted server path to this prefix.
    id_root: Option<String>,
}

impl Synchronizer {
    pub fn new(mode: WriteMode) -> Self {
        Synchronizer {
            mode,
            id_root: None,
        }
    }

    pub fn with_id_root(mut self, id_root: Option<String>) -> Self {
        self.id_root = id_root;
        self
    }

    /// Synchronize the whole tree. `root_url` is the public URL of the
    /// root document, used to derive child document URLs.
    pub fn synchronize(&self, tree: &TreeNode, root_url: &str) -> Result<SyncReport, CatalogError> {
        let mut report = SyncReport::default();
        match tree.record.kind {
            NodeKind::Catalog => {
                self.update_catalog(tree, root_url, &mut report)?;
            }
            NodeKind::Collection => {
                self.update_collection(tree, root_url, &mut report)?;
            }
            NodeKind::HttpStreamSrc => {
                self.update_source(tree, &mut report)?;
            }
            NodeKind::Other(ref kind) => {
                return Err(CatalogError::Structural(format!(
                    "cannot synchronize a node of type '{}'",
                    kind
                )));
            }
        }
        Ok(report)
    }

    fn update_catalog(
        &self,
        node: &TreeNode,
        node_url: &str,
        report: &mut SyncReport,
    ) -> Result<Map<String, Value>, CatalogError> {
        let mut doc = load_for(node)?;
        stamp_common(&mut doc, node);

        for (key, child) in &node.children {
            let sub_url = child_url(node_url, key);
            let child_doc = match child.record.kind {
                NodeKind::Catalog => self.update_catalog(child, &sub_url, report)?,
                NodeKind::Collection => self.update_collection(child, &sub_url, report)?,
                ref other => {
                    return Err(CatalogError::Structural(format!(
                        "unexpected catalog entry type '{}' for '{}'",
                        other, child.record.path
                    )));
                }
            };

            let entries = ensure_object(&mut doc, "catalog");
            let entry = ensure_object(entries, key);
            for member in ["type", "name", "title"] {
                if let Some(value) = child_doc.get(member) {
                    entry.insert(member.to_string(), value.clone());
                }
            }
            push_unique(ensure_array(entry, "urls"), Value::String(sub_url));
        }

        self.write(node, &doc, report)?;
        Ok(doc)
    }

    fn update_collection(
        &self,
        node: &TreeNode,
        node_url: &str,
        report: &mut SyncReport,
    ) -> Result<Map<String, Value>, CatalogError> {
        let mut doc = load_for(node)?;
        stamp_common(&mut doc, node);

        // Collections can pull summary information straight out of a das2
        // child's dataset definition.
        match collection_props(node) {
            Some(props) => {
                derive::merge_epncore(&mut doc, props);
                derive::merge_sci_contacts(&mut doc, props);
                derive::merge_collection_data(&mut doc, props);
                derive::merge_collection_coords(&mut doc, props);
            }
            None => {
                warn!(path = %node.record.path, "no dataset definition for collection");
            }
        }

        for (key, child) in &node.children {
            if child.record.kind != NodeKind::HttpStreamSrc {
                return Err(CatalogError::Structural(format!(
                    "unexpected collection entry type '{}' for '{}'",
                    child.record.kind, child.record.path
                )));
            }
            // A collection stays useful without its das2 source; skip the
            // entry and keep going.
            let child_doc = match self.update_source(child, report) {
                Ok(child_doc) => child_doc,
                Err(e) => {
                    error!(path = %child.record.path, error = %e, "stream source not synchronized");
                    report.failed += 1;
                    continue;
                }
            };

            let sub_url = child_url(node_url, key);
            let entries = ensure_object(&mut doc, "sources");
            let entry = ensure_object(entries, key);
            for member in ["type", "name"] {
                if let Some(value) = child_doc.get(member) {
                    entry.insert(member.to_string(), value.clone());
                }
            }
            entry.insert("purpose".to_string(), json!("primary-stream"));
            if let Some(convention) = child_doc
                .get("protocol")
                .and_then(|p| p.get("convention"))
            {
                entry.insert("convention".to_string(), convention.clone());
            }
            push_unique(ensure_array(entry, "urls"), Value::String(sub_url));
        }

        self.write(node, &doc, report)?;
        Ok(doc)
    }

    fn update_source(
        &self,
        node: &TreeNode,
        report: &mut SyncReport,
    ) -> Result<Map<String, Value>, CatalogError> {
        let record = &node.record;
        let props = record.props.as_ref().ok_or_else(|| {
            CatalogError::Server(format!(
                "dataset definition missing for stream source '{}'",
                record.path
            ))
        })?;

        let mut doc = load_for(node)?;
        stamp_common(&mut doc, node);

        {
            let proto = ensure_object(&mut doc, "protocol");
            proto.insert("convention".to_string(), json!("das2/2.2"));
        }

        if let Some(id_root) = &self.id_root {
            let dotted = record.server_path.join(".").to_ascii_lowercase();
            let uid = format!("{}{}", id_root, dotted.replace(' ', "_"));
            push_unique(ensure_array(&mut doc, "uris"), Value::String(uid));
        }

        derive::merge_tech_contacts(&mut doc, props);
        derive::merge_source_coords(&mut doc, props);
        derive::merge_source_data(&mut doc, props);
        derive::merge_format(&mut doc, props);

        // The DSDF may name the authoritative server itself.
        let server = first_value(props, "server")
            .map(str::to_string)
            .or_else(|| record.server.clone())
            .ok_or_else(|| {
                CatalogError::Structural(format!(
                    "no server known for stream source '{}'",
                    record.path
                ))
            })?;
        let dataset = record.dataset.clone().unwrap_or_default();
        let base_url = derive::dataset_base_url(&server, &dataset);

        {
            let proto = ensure_object(&mut doc, "protocol");
            push_unique(
                ensure_array(proto, "base_urls"),
                Value::String(base_url.clone()),
            );

            let authentication = match first_value(props, "securityRealm") {
                Some(realm) => json!({"required": true, "realm": realm}),
                None => json!({"required": false}),
            };
            proto.insert("authentication".to_string(), authentication);

            proto.insert("http_params".to_string(), http_params_for(props));
        }

        derive::merge_das2_params(&mut doc, props);
        derive::merge_examples(&mut doc, props, &base_url);

        self.write(node, &doc, report)?;
        Ok(doc)
    }

    fn write(
        &self,
        node: &TreeNode,
        doc: &Map<String, Value>,
        report: &mut SyncReport,
    ) -> Result<(), CatalogError> {
        match node.record.target_file.as_deref() {
            Some(path) => {
                let outcome = merge::write_document(doc, path, self.mode)?;
                report.count(outcome);
            }
            None => report.skipped += 1,
        }
        Ok(())
    }
}

fn load_for(node: &TreeNode) -> Result<Map<String, Value>, CatalogError> {
    match node.record.target_file.as_deref() {
        Some(path) => merge::load_existing(path),
        None => Ok(Map::new()),
    }
}

/// Author-owned members are kept; structural members are stamped.
fn stamp_common(doc: &mut Map<String, Value>, node: &TreeNode) {
    let record = &node.record;
    if !doc.contains_key("name") {
        doc.insert("name".to_string(), Value::String(record.name.clone()));
    }
    if !doc.contains_key("title") {
        if let Some(title) = &record.title {
            doc.insert("title".to_string(), Value::String(title.clone()));
        }
    }
    doc.insert("type".to_string(), Value::String(record.kind.as_str().to_string()));
    doc.insert("version".to_string(), json!(CATALOG_VERSION));
    doc.insert("path".to_string(), Value::String(record.path.clone()));
}

/// URL of a child document, hung off its parent's URL.
fn child_url(node_url: &str, key: &str) -> String {
    format!("{}/{}.json", node_url.trim_end_matches(".json"), key)
}

/// The dataset definition a collection summarizes: the first das2 child
/// that has one.
fn collection_props(node: &TreeNode) -> Option<&PropMap> {
    node.children
        .values()
        .find_map(|child| child.record.props.as_ref())
}

/// Fixed das2/2.2 query parameters, plus interval or resolution depending
/// on the reader.
fn http_params_for(props: &PropMap) -> Value {
    let mut params = Map::new();
    params.insert(
        "start_time".to_string(),
        json!({
            "required": true, "type": "isotime",
            "name": "Min Time", "title": "Minimum time value to stream"
        }),
    );
    params.insert(
        "end_time".to_string(),
        json!({
            "required": true, "type": "isotime",
            "name": "Max Time", "title": "Maximum Time Value to stream"
        }),
    );
    params.insert(
        "ascii".to_string(),
        json!({
            "required": false, "type": "boolean", "name": "UTF-8",
            "title": "Insure stream output is readable as UTF-8 text"
        }),
    );
    if prop_is_true(props, "requiresInterval") {
        params.insert(
            "interval".to_string(),
            json!({
                "required": true, "type": "real", "units": "s",
                "name": "Interval",
                "title": "Time interval between model calculations/interpolations",
                "description": "This parameter is used with data generated from models \
                 or table interpolations such as SPICE Ephemerides and magnetic field models"
            }),
        );
    } else {
        params.insert(
            "resolution".to_string(),
            json!({
                "required": false, "type": "real", "units": "s",
                "name": "Resolution",
                "title": "Maximum resolution between output time points",
                "description": "The server will return data at or better than the given \
                 resolution if possible.  Leave un-specified to get data at intrinsic \
                 resolution without server side averages"
            }),
        );
    }
    Value::Object(params)
}
