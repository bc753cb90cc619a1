//! Error taxonomy for catalog resolution and synchronization.
//!
//! Fetch failures on a single URL are modeled as [`Unavailable`] values and
//! converted into try-next-candidate control flow at the point of occurrence;
//! only exhaustion surfaces as [`CatalogError::NotFound`]. Cycle detection is
//! branch-local control flow inside the resolver, not an error.

use thiserror::Error;

/// A single URL could not be turned into a parsed catalog document.
///
/// Covers network failures, non-success HTTP status codes, and malformed
/// JSON alike. Non-fatal: the caller moves on to the next candidate URL.
#[derive(Debug, Clone, Error)]
#[error("'{url}' unavailable: {reason}")]
pub struct Unavailable {
    pub url: String,
    pub reason: String,
}

impl Unavailable {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Unavailable {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// All roots were exhausted without reaching the requested path.
    /// Carries the attempted-URL trail for diagnosis.
    #[error("catalog node '{path}' does not exist; lookup trail:\n{}", attempted.join("\n"))]
    NotFound {
        path: String,
        attempted: Vec<String>,
    },

    /// Ambiguous or orphaned record in the server inventory. Fatal to the
    /// synchronization run; nothing is written for the affected subtree.
    #[error("inventory structure error: {0}")]
    Structural(String),

    /// A das2 server request failed outright (list/id/dsdf queries).
    #[error("das2 server error: {0}")]
    Server(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
