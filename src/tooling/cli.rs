//! CLI commands.
//!
//! Two operations: `resolve` walks the federated catalog down to one node,
//! `import` synchronizes on-disk catalog documents from a legacy das2
//! server. Commands return their output as a string so the binary owns
//! process concerns (printing, exit codes).

use crate::config::DascatConfig;
use crate::error::CatalogError;
use crate::fetch::HttpFetcher;
use crate::import::server::{attach_props, Das2Server};
use crate::import::{plan_records, tree, ImportParams};
use crate::logging::init_logging;
use crate::resolve::Resolver;
use crate::sync::merge::WriteMode;
use crate::sync::Synchronizer;
use crate::tooling::format;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// dascat - federated das2 catalog resolution and import
#[derive(Parser)]
#[command(name = "dascat")]
#[command(about = "Resolve nodes in the federated das2 catalog and import server inventories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a virtual catalog path to its node document
    Resolve {
        /// Virtual path (e.g. "uiowa/juno"), full tag URI, or direct URL
        path: String,

        /// Root catalog URL(s) to start from, overriding configuration
        #[arg(long)]
        root: Vec<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Import a das2 server's inventory into on-disk catalog documents
    Import {
        /// das2 server base URL
        server: String,

        /// Dataset sub-path on the server to import ("/" for everything)
        server_path: String,

        /// Catalog URI the server root corresponds to (e.g. "site:/uiowa")
        cat_path: String,

        /// Public URL of the root catalog document (must end in .json)
        root_url: String,

        /// Output directory for merged documents
        out_dir: PathBuf,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Dataset path prefix to skip (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Mint stable source URIs under this prefix
        #[arg(long)]
        id_root: Option<String>,

        /// Title for the root node (defaults to the server's id reply)
        #[arg(long)]
        title: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

pub struct CliContext {
    config: DascatConfig,
}

impl CliContext {
    /// Load configuration, apply CLI logging overrides and install the
    /// subscriber.
    pub fn new(cli: &Cli) -> Result<Self, CatalogError> {
        let mut config = DascatConfig::load(cli.config.as_deref())?;
        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(log_format) = &cli.log_format {
            config.logging.format = log_format.clone();
        }
        if let Some(output) = &cli.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &cli.log_file {
            config.logging.file = Some(file.clone());
        }
        init_logging(&config.logging)?;
        Ok(CliContext { config })
    }

    pub fn execute(&self, command: &Commands) -> Result<String, CatalogError> {
        match command {
            Commands::Resolve { path, root, format } => self.handle_resolve(path, root, format),
            Commands::Import {
                server,
                server_path,
                cat_path,
                root_url,
                out_dir,
                dry_run,
                exclude,
                id_root,
                title,
                format,
            } => {
                let params = ImportParams {
                    server_url: server.clone(),
                    server_path: server_path.clone(),
                    cat_uri: cat_path.clone(),
                    root_url: root_url.clone(),
                    out_dir: out_dir.clone(),
                    exclude: exclude.clone(),
                    title: title.clone(),
                };
                self.handle_import(&params, *dry_run, id_root.as_deref(), format)
            }
        }
    }

    fn handle_resolve(
        &self,
        path: &str,
        root: &[String],
        format: &str,
    ) -> Result<String, CatalogError> {
        let fetcher = HttpFetcher::new(self.config.timeout())?;
        let roots = if root.is_empty() {
            self.config.roots.clone()
        } else {
            root.to_vec()
        };
        let resolver = Resolver::new(&fetcher, roots, self.config.namespace.clone())
            .with_policy(self.config.trailing_policy());

        let resolution = resolver.resolve(path);
        let rendered = match format {
            "json" => format::format_resolution_json(&resolution),
            "text" => format::format_resolution_text(&resolution),
            other => {
                return Err(CatalogError::Config(format!(
                    "unknown output format '{}' (must be 'text' or 'json')",
                    other
                )))
            }
        };
        if resolution.node.is_none() {
            // Render the trail on stdout but fail the command.
            println!("{}", rendered);
            return Err(CatalogError::NotFound {
                path: path.to_string(),
                attempted: resolution.attempted,
            });
        }
        Ok(rendered)
    }

    fn handle_import(
        &self,
        params: &ImportParams,
        dry_run: bool,
        id_root: Option<&str>,
        format: &str,
    ) -> Result<String, CatalogError> {
        let server = Das2Server::new(&params.server_url, self.config.timeout())?;

        info!(server = %params.server_url, "getting dataset list");
        let listing = server.dataset_list()?;
        let root_title = match &params.title {
            Some(title) => title.clone(),
            None => server.site_id()?,
        };

        let mut records = plan_records(&listing, &root_title, params)?;
        attach_props(&server, &mut records);
        let tree = tree::build(records)?;

        let mode = if dry_run {
            WriteMode::DryRun
        } else {
            WriteMode::Commit
        };
        let report = Synchronizer::new(mode)
            .with_id_root(id_root.map(str::to_string))
            .synchronize(&tree, &params.root_url)?;

        match format {
            "json" => Ok(format::format_sync_report_json(&report, mode)),
            "text" => Ok(format::format_sync_report_text(&report, mode)),
            other => Err(CatalogError::Config(format!(
                "unknown output format '{}' (must be 'text' or 'json')",
                other
            ))),
        }
    }
}
