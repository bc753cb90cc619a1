//! Import planning from a legacy das2 server inventory.
//!
//! The server reports a flat, pipe-delimited dataset listing. This module
//! turns that listing into [`ImportRecord`]s: filtered, sorted, mapped to
//! virtual catalog paths and on-disk target files. The records then feed the
//! tree builder and the synchronizer.

pub mod dsdf;
pub mod server;
pub mod tree;

use crate::catalog::path::{at_or_under, leads_to};
use crate::catalog::NodeKind;
use crate::error::CatalogError;
use dsdf::PropMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix prepended to bare catalog URIs.
pub const TAG_PREFIX: &str = "tag:das2.org,2012:";

/// Display name given to the implicit das2 stream source under each
/// collection.
pub const DAS2_SOURCE_NAME: &str = "Das2/2.2 Source";

/// One node implied by the server inventory.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    /// Path segments as reported by the server; empty for the root.
    pub server_path: Vec<String>,
    pub kind: NodeKind,
    pub name: String,
    pub title: Option<String>,
    /// Virtual catalog path for this node.
    pub path: String,
    /// Where the merged document is written; `None` for nodes above the
    /// portion being synchronized.
    pub target_file: Option<PathBuf>,
    /// Parsed DSDF properties, attached later for stream sources.
    pub props: Option<PropMap>,
    /// das2 server base URL, for building stream base_urls.
    pub server: Option<String>,
    /// Dataset identifier on the server (stream sources only).
    pub dataset: Option<String>,
}

/// Caller-side parameters for planning an import run.
#[derive(Debug, Clone)]
pub struct ImportParams {
    /// das2 server base URL, e.g. `http://planet.physics.uiowa.edu/das/das2Server`.
    pub server_url: String,
    /// Top-level dataset directory to read, relative to the server root.
    pub server_path: String,
    /// Catalog URI corresponding to the server root, e.g. `site:/uiowa`.
    pub cat_uri: String,
    /// URL serving the root catalog file for this server; must end in `.json`.
    pub root_url: String,
    /// Output directory for merged documents.
    pub out_dir: PathBuf,
    /// Dataset path prefixes to skip entirely.
    pub exclude: Vec<String>,
    /// Title for the root node; the server id query answers it when absent.
    pub title: Option<String>,
}

impl ImportParams {
    /// Catalog URI with the tag prefix applied, lower-cased, no trailing
    /// slash.
    pub fn full_cat_uri(&self) -> String {
        let mut uri = self.cat_uri.to_ascii_lowercase();
        if !uri.starts_with(TAG_PREFIX) {
            uri = format!("{}{}", TAG_PREFIX, uri);
        }
        while uri.ends_with('/') {
            uri.pop();
        }
        uri
    }

    /// Segment form of the requested server sub-path.
    pub fn include_segments(&self) -> Vec<String> {
        self.server_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if !self.root_url.ends_with(".json") {
            return Err(CatalogError::Config(
                "root catalog URL must end in '.json'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse the server's flat listing and plan the records to synchronize.
///
/// `root_title` is the title for the artificial root record (the server's
/// own id string, or a caller override). Returns records sorted by server
/// path, each holding its virtual path and target filename; an error when
/// nothing on the server matches the requested sub-path.
pub fn plan_records(
    listing: &str,
    root_title: &str,
    params: &ImportParams,
) -> Result<Vec<ImportRecord>, CatalogError> {
    params.validate()?;
    let cat_uri = params.full_cat_uri();
    let include = params.include_segments();

    let root_name = cat_uri
        .rsplit('/')
        .next()
        .unwrap_or(cat_uri.as_str())
        .to_string();

    let mut records = vec![ImportRecord {
        server_path: Vec::new(),
        kind: NodeKind::Catalog,
        name: root_name,
        title: Some(root_title.to_string()),
        path: String::new(),
        target_file: None,
        props: None,
        server: None,
        dataset: None,
    }];

    for line in listing.lines() {
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        let srv_node = parts[0].trim_end_matches(".dsdf");
        if srv_node.len() < 2 {
            continue;
        }
        let low = srv_node.to_ascii_lowercase();
        if low.contains("/test/") || low.contains("/testing/") {
            continue;
        }
        if is_excluded(srv_node, &params.exclude) {
            continue;
        }

        // Trailing slash marks a directory-style Catalog entry.
        let kind = if srv_node.ends_with('/') {
            NodeKind::Catalog
        } else {
            NodeKind::Collection
        };
        let segments: Vec<String> = srv_node
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            continue;
        }
        let title = parts
            .get(1)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let name = segments[segments.len() - 1].replace('_', " ");

        records.push(ImportRecord {
            server_path: segments,
            kind,
            name,
            title,
            path: String::new(),
            target_file: None,
            props: None,
            server: None,
            dataset: None,
        });
    }

    records.sort_by(|a, b| a.server_path.cmp(&b.server_path));

    // Keep only records at/under the requested sub-path (they get target
    // files) or leading to it (they stay as untargeted ancestors), and give
    // every kept collection its implicit das2 stream source child.
    let srv_dir = root_basename(&params.root_url);
    let mut kept: Vec<ImportRecord> = Vec::new();
    let mut writable = 0usize;

    for mut record in records {
        if at_or_under(&record.server_path, &include) {
            record.target_file =
                Some(target_file(&params.out_dir, &srv_dir, &record.server_path, &include, &params.root_url));
            writable += 1;

            // Every collection carries one implicit das2 stream source.
            if record.kind == NodeKind::Collection {
                let mut src_path = record.server_path.clone();
                src_path.push("das2".to_string());
                let src_target =
                    target_file(&params.out_dir, &srv_dir, &src_path, &include, &params.root_url);
                let child = ImportRecord {
                    server_path: src_path,
                    kind: NodeKind::HttpStreamSrc,
                    name: DAS2_SOURCE_NAME.to_string(),
                    title: record.title.clone(),
                    path: String::new(),
                    target_file: Some(src_target),
                    props: None,
                    server: Some(params.server_url.clone()),
                    dataset: Some(record.server_path.join("/")),
                };
                kept.push(record);
                kept.push(child);
                continue;
            }
            kept.push(record);
        } else if leads_to(&record.server_path, &include) {
            kept.push(record);
        }
    }

    if writable == 0 {
        return Err(CatalogError::Server(format!(
            "no datasets on server '{}' match path '{}'",
            params.server_url, params.server_path
        )));
    }

    // Virtual paths always hang off the server root URI, whichever branch
    // is being written.
    for record in &mut kept {
        let lower = record
            .server_path
            .iter()
            .map(|s| s.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("/");
        record.path = if lower.is_empty() {
            cat_uri.clone()
        } else {
            format!("{}/{}", cat_uri, lower)
        };
    }
    kept.sort_by(|a, b| a.server_path.cmp(&b.server_path));

    info!(
        records = kept.len(),
        writable, "planned import from server listing"
    );
    Ok(kept)
}

fn is_excluded(srv_node: &str, exclude: &[String]) -> bool {
    let node = srv_node.strip_prefix('/').unwrap_or(srv_node);
    exclude.iter().any(|e| {
        let e = e.strip_prefix('/').unwrap_or(e);
        node.starts_with(e)
    })
}

/// Directory name the root catalog file implies, e.g.
/// `http://das2.org/catalog/das/site/uiowa.json` -> `uiowa`.
fn root_basename(root_url: &str) -> String {
    let base = root_url.rsplit('/').next().unwrap_or(root_url);
    base.trim_end_matches(".json").to_ascii_lowercase()
}

/// Target filename mirroring the virtual namespace, lower-cased.
fn target_file(
    out_dir: &Path,
    srv_dir: &str,
    server_path: &[String],
    include: &[String],
    root_url: &str,
) -> PathBuf {
    if server_path.is_empty() {
        let base = root_url.rsplit('/').next().unwrap_or(root_url);
        return out_dir.join(base.to_ascii_lowercase());
    }
    let mut full: Vec<String> = Vec::with_capacity(server_path.len() + 1);
    full.push(srv_dir.to_string());
    full.extend(server_path.iter().cloned());
    // Drop the part of the path above the requested include level.
    let skip = include.len();
    let partial = full[skip..].join("/").to_ascii_lowercase();
    out_dir.join(format!("{}.json", partial))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ImportParams {
        ImportParams {
            server_url: "http://example.org/das2Server".to_string(),
            server_path: "/".to_string(),
            cat_uri: "site:/uiowa".to_string(),
            root_url: "http://das2.org/catalog/das/site/uiowa.json".to_string(),
            out_dir: PathBuf::from("/tmp/out"),
            exclude: Vec::new(),
            title: None,
        }
    }

    #[test]
    fn test_full_cat_uri_normalization() {
        let p = params();
        assert_eq!(p.full_cat_uri(), "tag:das2.org,2012:site:/uiowa");

        let mut p2 = params();
        p2.cat_uri = "tag:das2.org,2012:Site:/Uiowa/".to_string();
        assert_eq!(p2.full_cat_uri(), "tag:das2.org,2012:site:/uiowa");
    }

    #[test]
    fn test_plan_basic_listing() {
        let listing = "juno/ | Juno mission\njuno/wav | Waves survey\n";
        let records = plan_records(listing, "U. Iowa server", &params()).unwrap();

        // root + juno + juno/wav + implicit das2 source
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].server_path, Vec::<String>::new());
        assert_eq!(records[0].kind, NodeKind::Catalog);
        assert_eq!(records[0].name, "uiowa");

        let juno = &records[1];
        assert_eq!(juno.kind, NodeKind::Catalog);
        assert_eq!(juno.path, "tag:das2.org,2012:site:/uiowa/juno");

        let wav = &records[2];
        assert_eq!(wav.kind, NodeKind::Collection);
        assert_eq!(wav.name, "wav");
        assert_eq!(
            wav.target_file.as_deref(),
            Some(Path::new("/tmp/out/uiowa/juno/wav.json"))
        );

        let das2 = &records[3];
        assert_eq!(das2.kind, NodeKind::HttpStreamSrc);
        assert_eq!(das2.dataset.as_deref(), Some("juno/wav"));
        assert_eq!(
            das2.target_file.as_deref(),
            Some(Path::new("/tmp/out/uiowa/juno/wav/das2.json"))
        );
    }

    #[test]
    fn test_root_record_target() {
        let listing = "juno/ | Juno\n";
        let records = plan_records(listing, "t", &params()).unwrap();
        assert_eq!(
            records[0].target_file.as_deref(),
            Some(Path::new("/tmp/out/uiowa.json"))
        );
    }

    #[test]
    fn test_excludes_and_test_paths() {
        let listing = "\
juno/ | Juno\n\
juno/test/x | hidden\n\
cassini/ | Cassini\n\
cassini/rpws | RPWS\n";
        let mut p = params();
        p.exclude = vec!["cassini".to_string()];
        let records = plan_records(listing, "t", &p).unwrap();
        assert!(records
            .iter()
            .all(|r| !r.server_path.iter().any(|s| s == "cassini")));
        assert!(records.iter().all(|r| !r.server_path.iter().any(|s| s == "test")));
    }

    #[test]
    fn test_subtree_include_marks_ancestors_untargeted() {
        let listing = "juno/ | Juno\njuno/wav | Waves\ncassini/ | Cassini\n";
        let mut p = params();
        p.server_path = "juno".to_string();
        let records = plan_records(listing, "t", &p).unwrap();

        // Root leads to the include path: kept but not written.
        let root = records.iter().find(|r| r.server_path.is_empty()).unwrap();
        assert!(root.target_file.is_none());
        // Cassini is unrelated: dropped.
        assert!(!records
            .iter()
            .any(|r| r.server_path.first().map(String::as_str) == Some("cassini")));
        // Targets are relative to the include level.
        let juno = records
            .iter()
            .find(|r| r.server_path == vec!["juno".to_string()])
            .unwrap();
        assert_eq!(
            juno.target_file.as_deref(),
            Some(Path::new("/tmp/out/juno.json"))
        );
    }

    #[test]
    fn test_empty_listing_is_an_error() {
        let mut p = params();
        p.server_path = "nothere".to_string();
        let err = plan_records("juno/ | Juno\n", "t", &p).unwrap_err();
        assert!(matches!(err, CatalogError::Server(_)));
    }

    #[test]
    fn test_bad_root_url_rejected() {
        let mut p = params();
        p.root_url = "http://das2.org/catalog/uiowa".to_string();
        assert!(matches!(
            plan_records("juno/ | j\n", "t", &p),
            Err(CatalogError::Config(_))
        ));
    }
}
