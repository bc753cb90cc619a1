//! Runtime configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file (explicit path or the platform config directory), then
//! `DASCAT`-prefixed environment variables.

use crate::catalog::path::TrailingPolicy;
use crate::error::CatalogError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DascatConfig {
    /// Root catalog locations, tried in order.
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,

    /// Namespace prefix relative path requests resolve under.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Collapse runs of trailing separators when matching paths, for
    /// catalogs known to carry sloppy entries.
    #[serde(default)]
    pub normalize_trailing: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_roots() -> Vec<String> {
    vec![
        "http://das2.org/catalog".to_string(),
        "https://raw.githubusercontent.com/das-developers/das-cat/master/cat/index.json".to_string(),
    ]
}

fn default_namespace() -> String {
    "tag:das2.org,2012:site".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

impl Default for DascatConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            namespace: default_namespace(),
            timeout_secs: default_timeout_secs(),
            normalize_trailing: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl DascatConfig {
    /// Load configuration, merging file and environment over defaults.
    ///
    /// With an explicit `path` the file must exist; without one the
    /// platform config directory is consulted and silently skipped when
    /// absent.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(File::from(p.to_path_buf()));
            }
            None => {
                if let Some(dirs) = directories::ProjectDirs::from("", "dascat", "dascat") {
                    let default_file = dirs.config_dir().join("dascat.toml");
                    builder = builder
                        .add_source(File::from(default_file).required(false));
                }
            }
        }
        builder = builder.add_source(Environment::with_prefix("DASCAT").separator("__"));

        let config = builder
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to load configuration: {}", e)))?;
        config
            .try_deserialize()
            .map_err(|e| CatalogError::Config(format!("invalid configuration: {}", e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn trailing_policy(&self) -> TrailingPolicy {
        if self.normalize_trailing {
            TrailingPolicy::Normalize
        } else {
            TrailingPolicy::Single
        }
    }
}
