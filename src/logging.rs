//! Structured logging on `tracing`.
//!
//! Level, format and destination come from the configuration file with
//! `DASCAT_LOG*` environment variables taking precedence. The default
//! destination is stderr so resolved nodes and sync summaries on stdout
//! stay machine-readable.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json or text.
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file or file+stderr.
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means the platform
    /// state directory.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Colored output, text format on a terminal only.
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific level overrides.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Install the global subscriber.
///
/// Precedence, highest first: `DASCAT_LOG` / `DASCAT_LOG_FORMAT` /
/// `DASCAT_LOG_OUTPUT` / `DASCAT_LOG_FILE` environment variables, then the
/// configuration file, then defaults.
pub fn init_logging(config: &LoggingConfig) -> Result<(), CatalogError> {
    if !config.enabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;

    let writer = match output {
        Output::Stdout => BoxMakeWriter::new(std::io::stdout),
        Output::Stderr => BoxMakeWriter::new(std::io::stderr),
        Output::File => BoxMakeWriter::new(open_log_file(config)?),
        Output::FileAndStderr => {
            BoxMakeWriter::new(open_log_file(config)?.and(std::io::stderr))
        }
    };
    // Color never makes sense inside a log file.
    let ansi = config.color && !matches!(output, Output::File | Output::FileAndStderr);

    let layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);
    let base = Registry::default().with(filter);
    if format == "json" {
        base.with(layer.json()).init();
    } else {
        base.with(layer.with_ansi(ansi)).init();
    }
    Ok(())
}

fn open_log_file(config: &LoggingConfig) -> Result<std::fs::File, CatalogError> {
    let path = match &config.file {
        Some(p) if !p.as_os_str().is_empty() => p.clone(),
        _ => default_log_file_path()?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| CatalogError::Config(format!("failed to open log file {:?}: {}", path, e)))
}

fn default_log_file_path() -> Result<PathBuf, CatalogError> {
    if let Ok(env_path) = std::env::var("DASCAT_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    let project_dirs = directories::ProjectDirs::from("", "dascat", "dascat").ok_or_else(|| {
        CatalogError::Config("could not determine platform state directory for log file".to_string())
    })?;
    let state_dir = project_dirs
        .state_dir()
        .or_else(|| Some(project_dirs.cache_dir()))
        .ok_or_else(|| {
            CatalogError::Config("platform state directory not available for log file".to_string())
        })?;
    Ok(state_dir.join("dascat.log"))
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, CatalogError> {
    if let Ok(filter) = EnvFilter::try_from_env("DASCAT_LOG") {
        return Ok(filter);
    }

    let mut filter = EnvFilter::new(config.level.as_str());
    for (module, level) in &config.modules {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| CatalogError::Config(format!("invalid log directive: {}", e)))?,
        );
    }
    Ok(filter)
}

fn determine_format(config: &LoggingConfig) -> Result<String, CatalogError> {
    let format = match std::env::var("DASCAT_LOG_FORMAT") {
        Ok(f) if f == "json" || f == "text" => f,
        _ => config.format.clone(),
    };
    if format != "json" && format != "text" {
        return Err(CatalogError::Config(format!(
            "invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Stdout,
    Stderr,
    File,
    FileAndStderr,
}

fn determine_output(config: &LoggingConfig) -> Result<Output, CatalogError> {
    let output = match std::env::var("DASCAT_LOG_OUTPUT") {
        Ok(o) => o,
        Err(_) => config.output.clone(),
    };
    match output.as_str() {
        "stdout" => Ok(Output::Stdout),
        "stderr" => Ok(Output::Stderr),
        "file" => Ok(Output::File),
        "file+stderr" => Ok(Output::FileAndStderr),
        other => Err(CatalogError::Config(format!(
            "invalid log output: {} (must be 'stdout', 'stderr', 'file' or 'file+stderr')",
            other
        ))),
    }
}
