//! Legacy das2 server client.
//!
//! The whole server API is three query forms against one base URL:
//! `?server=list` (flat dataset inventory), `?server=id` (human-readable
//! server description) and `?server=dsdf&dataset=...` (stream header for
//! one dataset).

use super::dsdf::{self, PropMap};
use super::ImportRecord;
use crate::catalog::NodeKind;
use crate::error::CatalogError;
use std::time::Duration;
use tracing::{error, info};

pub struct Das2Server {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl Das2Server {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Das2Server {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The flat, pipe-delimited dataset inventory.
    pub fn dataset_list(&self) -> Result<String, CatalogError> {
        self.get_text(&format!("{}?server=list", self.base_url))
    }

    /// The server's one-line description of itself.
    pub fn site_id(&self) -> Result<String, CatalogError> {
        Ok(self
            .get_text(&format!("{}?server=id", self.base_url))?
            .trim()
            .to_string())
    }

    /// Stream-header properties for one dataset.
    pub fn dsdf(&self, dataset: &str) -> Result<PropMap, CatalogError> {
        let url = format!("{}?server=dsdf&dataset={}", self.base_url, dataset);
        let text = self.get_text(&url)?;
        dsdf::parse_props(&url, &text)
    }

    fn get_text(&self, url: &str) -> Result<String, CatalogError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| CatalogError::Server(format!("request to '{}' failed: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Server(format!(
                "'{}' answered HTTP status {}",
                url, status
            )));
        }
        response
            .text()
            .map_err(|e| CatalogError::Server(format!("reading reply from '{}': {}", url, e)))
    }
}

/// Fetch and attach DSDF properties for every stream-source record.
///
/// A dataset whose definition cannot be fetched or parsed is logged and
/// left without properties; the synchronizer later counts it as failed
/// without touching its siblings.
pub fn attach_props(server: &Das2Server, records: &mut [ImportRecord]) {
    let total = records
        .iter()
        .filter(|r| r.kind == NodeKind::HttpStreamSrc)
        .count();
    info!(total, server = server.base_url(), "gathering dataset definitions");

    for record in records.iter_mut() {
        if record.kind != NodeKind::HttpStreamSrc {
            continue;
        }
        let dataset = match (record.dataset.as_deref(), record.server_path.split_last()) {
            (Some(d), _) => d.to_string(),
            (None, Some((_, parents))) => parents.join("/"),
            (None, None) => continue,
        };
        info!(dataset = %dataset, "getting dataset definition");
        match server.dsdf(&dataset) {
            Ok(props) => {
                record.server = Some(server.base_url().to_string());
                record.dataset = Some(dataset);
                record.props = Some(props);
            }
            Err(e) => {
                error!(dataset = %dataset, error = %e, "could not get dataset definition");
            }
        }
    }
}
