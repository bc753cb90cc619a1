//! Tree assembly from flat import records.
//!
//! The server inventory is flat; the catalog is a tree. Records are grouped
//! by path depth and collapsed tail-first: each record at the deepest
//! remaining depth is attached to the record whose path equals its own minus
//! the last segment. Exactly one record may remain unattached at the end,
//! the root. Anything else is a structural fault in the inventory.

use super::ImportRecord;
use crate::error::CatalogError;
use std::collections::BTreeMap;

/// A node of the assembled import tree, children keyed by their last server
/// path segment.
#[derive(Debug)]
pub struct TreeNode {
    pub record: ImportRecord,
    pub children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    /// All server paths in the tree, depth-first. Mostly useful for
    /// verifying that assembly lost nothing.
    pub fn flatten_paths(&self) -> Vec<Vec<String>> {
        let mut out = vec![self.record.server_path.clone()];
        for child in self.children.values() {
            out.extend(child.flatten_paths());
        }
        out
    }
}

/// Collapse flat records into a single tree rooted at the shortest path.
pub fn build(records: Vec<ImportRecord>) -> Result<TreeNode, CatalogError> {
    if records.is_empty() {
        return Err(CatalogError::Structural(
            "cannot build a tree from zero records".to_string(),
        ));
    }

    let mut slots: Vec<Option<ImportRecord>> = Vec::with_capacity(records.len());
    let mut kids: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut by_path: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();

    for (i, record) in records.into_iter().enumerate() {
        by_path.entry(record.server_path.clone()).or_default().push(i);
        slots.push(Some(record));
    }
    for (path, indices) in &by_path {
        if indices.len() > 1 {
            return Err(CatalogError::Structural(format!(
                "duplicate inventory path '{}'",
                path.join("/")
            )));
        }
    }

    let shortest = by_path.keys().map(Vec::len).min().unwrap_or(0);
    let longest = by_path.keys().map(Vec::len).max().unwrap_or(0);

    let mut attached = vec![false; slots.len()];
    for depth in ((shortest + 1)..=longest).rev() {
        let layer: Vec<usize> = by_path
            .iter()
            .filter(|(path, _)| path.len() == depth)
            .map(|(_, indices)| indices[0])
            .collect();

        for child_idx in layer {
            let child_path = match &slots[child_idx] {
                Some(r) => r.server_path.clone(),
                None => continue,
            };
            let parent_path = child_path[..child_path.len() - 1].to_vec();
            let parent_idx = match by_path.get(&parent_path) {
                Some(indices) => indices[0],
                None => {
                    return Err(CatalogError::Structural(format!(
                        "no parent found for inventory path '{}'",
                        child_path.join("/")
                    )))
                }
            };
            kids[parent_idx].push(child_idx);
            attached[child_idx] = true;
        }
    }

    let roots: Vec<usize> = attached
        .iter()
        .enumerate()
        .filter(|(_, a)| !**a)
        .map(|(i, _)| i)
        .collect();
    let root_idx = match roots.as_slice() {
        [one] => *one,
        [] => {
            return Err(CatalogError::Structural(
                "inventory collapsed to no root".to_string(),
            ))
        }
        many => {
            let paths: Vec<String> = many
                .iter()
                .filter_map(|i| slots[*i].as_ref())
                .map(|r| r.server_path.join("/"))
                .collect();
            return Err(CatalogError::Structural(format!(
                "inventory has {} roots: {}",
                many.len(),
                paths.join(", ")
            )));
        }
    };

    assemble(root_idx, &mut slots, &kids)
}

fn assemble(
    idx: usize,
    slots: &mut Vec<Option<ImportRecord>>,
    kids: &[Vec<usize>],
) -> Result<TreeNode, CatalogError> {
    let record = slots[idx].take().ok_or_else(|| {
        CatalogError::Structural("inventory record attached to two parents".to_string())
    })?;
    let mut children = BTreeMap::new();
    for &child_idx in &kids[idx] {
        let child = assemble(child_idx, slots, kids)?;
        let key = match child.record.server_path.last() {
            Some(seg) => seg.to_ascii_lowercase(),
            None => continue,
        };
        children.insert(key, child);
    }
    Ok(TreeNode { record, children })
}
