//! Command-line tooling.

pub mod cli;
pub mod format;
