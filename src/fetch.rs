//! Node fetching.
//!
//! One trait seam, [`NodeFetcher`], so the resolver never cares whether a
//! document came over HTTP, off the local disk, or out of a test fixture.
//! Every failure mode (transport error, non-success status, malformed JSON,
//! schema violation) maps to [`Unavailable`]; retries are the caller's
//! business, expressed as alternate candidate URLs.

use crate::catalog::CatalogNode;
use crate::error::{CatalogError, Unavailable};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Retrieves and parses one catalog document per call. No caching: every
/// resolution is a cold walk by design.
pub trait NodeFetcher {
    fn fetch(&self, url: &str) -> Result<CatalogNode, Unavailable>;
}

/// Blocking fetcher for `http(s)://` URLs, `file://` URLs, and bare local
/// paths.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CatalogError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(HttpFetcher { client })
    }

    fn fetch_http(&self, url: &str) -> Result<String, Unavailable> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Unavailable::new(url, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Unavailable::new(url, format!("HTTP status {}", status)));
        }
        response
            .text()
            .map_err(|e| Unavailable::new(url, e.to_string()))
    }

    fn fetch_file(url: &str) -> Result<String, Unavailable> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        std::fs::read_to_string(Path::new(path)).map_err(|e| Unavailable::new(url, e.to_string()))
    }
}

impl NodeFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<CatalogNode, Unavailable> {
        debug!(url, "fetching catalog node");
        let text = if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url)?
        } else {
            Self::fetch_file(url)?
        };
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| Unavailable::new(url, e.to_string()))?;
        CatalogNode::from_value(value, url)
    }
}
