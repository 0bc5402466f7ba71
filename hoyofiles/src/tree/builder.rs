//! Incremental construction of a [`FileTree`].

use std::collections::HashMap;

use thiserror::Error;

use super::node::{FileNode, NodeId, NodeKind};
use super::{DiffInfo, FileTree, RemoteObjectRef};
use crate::game::{GameTarget, VoiceLocale};

/// Structural conflicts detected while inserting manifest entries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TreeConflict {
    #[error("{path} is declared twice with different content ({first} vs {second})")]
    ContentMismatch {
        path: String,
        first: String,
        second: String,
    },

    #[error("{path} is declared as both a file and a directory")]
    KindMismatch { path: String },

    #[error("patch targets {path}, which is not a file in the package index")]
    MissingPatchTarget { path: String },

    #[error("{path} has more than one patch")]
    DuplicatePatch { path: String },
}

/// Builds a [`FileTree`] from validated, normalized paths.
///
/// Paths must already be relative, `/`-separated and free of empty, `.` or
/// `..` segments; the manifest parser guarantees this.
pub struct TreeBuilder {
    target: GameTarget,
    nodes: Vec<FileNode>,
    index: HashMap<String, NodeId>,
    diff: Option<DiffInfo>,
}

impl TreeBuilder {
    pub fn new(target: GameTarget) -> Self {
        let root = FileNode::directory(NodeId(0), String::new(), String::new(), None);
        let mut index = HashMap::new();
        index.insert(String::new(), NodeId(0));
        Self {
            target,
            nodes: vec![root],
            index,
            diff: None,
        }
    }

    /// Insert a file.
    ///
    /// Returns `Ok(false)` when an identical file (same size and checksum)
    /// is already present, which happens when voice and package indices
    /// both list a shared asset.
    pub fn insert_file(
        &mut self,
        path: &str,
        object: RemoteObjectRef,
        locale: Option<VoiceLocale>,
        content_hash: Option<String>,
    ) -> Result<bool, TreeConflict> {
        if let Some(&id) = self.index.get(path) {
            let existing = &self.nodes[id.0];
            return match &existing.object {
                None => Err(TreeConflict::KindMismatch {
                    path: path.to_string(),
                }),
                Some(current)
                    if current.checksum == object.checksum
                        && current.size_bytes == object.size_bytes =>
                {
                    Ok(false)
                }
                Some(current) => Err(TreeConflict::ContentMismatch {
                    path: path.to_string(),
                    first: format!("{} bytes, {}", current.size_bytes, current.checksum),
                    second: format!("{} bytes, {}", object.size_bytes, object.checksum),
                }),
            };
        }

        let parent = self.ensure_parent_dirs(path)?;
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let id = NodeId(self.nodes.len());
        self.nodes.push(FileNode {
            id,
            path: path.to_string(),
            name,
            kind: NodeKind::File,
            size: object.size_bytes,
            object: Some(object),
            patch: None,
            locale,
            content_hash,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        self.index.insert(path.to_string(), id);
        Ok(true)
    }

    /// Attach a diff payload to an existing file.
    pub fn attach_patch(&mut self, path: &str, patch: RemoteObjectRef) -> Result<(), TreeConflict> {
        let node = self
            .index
            .get(path)
            .map(|id| &mut self.nodes[id.0])
            .filter(|n| n.kind == NodeKind::File)
            .ok_or_else(|| TreeConflict::MissingPatchTarget {
                path: path.to_string(),
            })?;

        if node.patch.is_some() {
            return Err(TreeConflict::DuplicatePatch {
                path: path.to_string(),
            });
        }
        node.patch = Some(patch.as_diff_patch());
        Ok(())
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.index
            .get(path)
            .is_some_and(|id| self.nodes[id.0].kind == NodeKind::File)
    }

    pub fn set_diff(&mut self, diff: DiffInfo) {
        self.diff = Some(diff);
    }

    /// Sort children, aggregate directory sizes and freeze the tree.
    pub fn build(mut self) -> FileTree {
        for i in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[i].children);
            children.sort_by(|a, b| self.nodes[a.0].name.cmp(&self.nodes[b.0].name));
            self.nodes[i].children = children;
        }

        // Children always have larger ids than their parent.
        for i in (1..self.nodes.len()).rev() {
            let size = self.nodes[i].size;
            if let Some(parent) = self.nodes[i].parent {
                self.nodes[parent.0].size += size;
            }
        }

        let file_count = self.nodes.iter().filter(|n| n.is_file()).count();
        FileTree {
            target: self.target,
            nodes: self.nodes,
            index: self.index,
            diff: self.diff,
            file_count,
        }
    }

    fn ensure_parent_dirs(&mut self, path: &str) -> Result<NodeId, TreeConflict> {
        let mut parent = NodeId(0);
        let mut end = 0;
        while let Some(offset) = path[end..].find('/') {
            end += offset;
            let dir_path = &path[..end];
            parent = match self.index.get(dir_path) {
                Some(&id) if self.nodes[id.0].kind == NodeKind::File => {
                    return Err(TreeConflict::KindMismatch {
                        path: dir_path.to_string(),
                    });
                }
                Some(&id) => id,
                None => {
                    let id = NodeId(self.nodes.len());
                    let name = dir_path.rsplit('/').next().unwrap_or(dir_path).to_string();
                    self.nodes
                        .push(FileNode::directory(id, dir_path.to_string(), name, Some(parent)));
                    self.nodes[parent.0].children.push(id);
                    self.index.insert(dir_path.to_string(), id);
                    id
                }
            };
            end += 1;
        }
        Ok(parent)
    }
}
