//! Federated das2 catalog tooling.
//!
//! The catalog is a tree of small JSON documents linked by URL, mirrored
//! across multiple root sites. This crate resolves virtual paths against
//! that tree with a stateless walk ([`resolve`]) and regenerates the
//! on-disk documents from a legacy das2 server's flat inventory
//! ([`import`] and [`sync`]), merging around hand-authored edits.

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod import;
pub mod logging;
pub mod resolve;
pub mod sync;
pub mod tooling;

pub use catalog::{CatalogNode, NodeKind, ResolvedNode};
pub use error::{CatalogError, Unavailable};
pub use resolve::{Resolution, Resolver};
