//! Hash-gated document writes.
//!
//! Catalog files on disk may be hand edited between runs, so every write is
//! a merge: the caller folds derived fields into whatever the file already
//! holds, then the result lands on disk only when its bytes actually differ
//! from what is there. Unchanged files keep their mtimes, which keeps
//! mirror rsyncs quiet.

use crate::error::CatalogError;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Whether a run is allowed to touch the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Commit,
    DryRun,
}

/// What one document write did (or would have done).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Unchanged,
    Updated,
    WouldUpdate,
}

/// Read an existing document, or start fresh when the file is absent.
///
/// A present-but-unreadable file is an error: silently replacing a
/// hand-edited document that failed to parse would destroy the edits.
pub fn load_existing(path: &Path) -> Result<Map<String, Value>, CatalogError> {
    if !path.is_file() {
        return Ok(Map::new());
    }
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CatalogError::Structural(format!(
            "existing file '{}' is not a JSON object",
            path.display()
        ))),
    }
}

/// Serialize `doc` and write it to `path` behind a content-hash gate.
///
/// Identical content is never rewritten. On a real write the bytes go to a
/// sibling temp file first and are renamed into place, so readers never see
/// a half-written document. Dry runs report what would happen and leave the
/// filesystem alone.
pub fn write_document(
    doc: &Map<String, Value>,
    path: &Path,
    mode: WriteMode,
) -> Result<WriteOutcome, CatalogError> {
    let new_text = serde_json::to_string_pretty(&Value::Object(doc.clone()))?;
    let new_hash = blake3::hash(new_text.as_bytes());

    let old_hash = if path.is_file() {
        Some(blake3::hash(&fs::read(path)?))
    } else {
        None
    };

    if old_hash == Some(new_hash) {
        debug!(file = %path.display(), "no updates required");
        return Ok(WriteOutcome::Unchanged);
    }

    match mode {
        WriteMode::DryRun => {
            info!(file = %path.display(), "would have updated");
            Ok(WriteOutcome::WouldUpdate)
        }
        WriteMode::Commit => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, new_text.as_bytes())?;
            fs::rename(&tmp, path)?;
            info!(file = %path.display(), "updated");
            Ok(WriteOutcome::Updated)
        }
    }
}

/// The object under `key`, inserting or replacing as needed so derived
/// members always have somewhere to land.
pub fn ensure_object<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(obj) => obj,
        _ => unreachable!(),
    }
}

/// The array under `key`, same contract as [`ensure_object`].
pub fn ensure_array<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Vec<Value> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    match entry {
        Value::Array(arr) => arr,
        _ => unreachable!(),
    }
}

/// Append `value` unless an equal element is already present.
pub fn push_unique(list: &mut Vec<Value>, value: Value) {
    if !list.contains(&value) {
        list.push(value);
    }
}
