//! Immutable file tree for one game target.
//!
//! A [`FileTree`] is the merged view of a package index, any selected voice
//! indices and an optional diff index. Once built it is never mutated, so it
//! can be shared freely between the browsing, link and download paths.
//!
//! ```text
//! FileTree
//!   ├── nodes: arena of FileNode (id 0 is the root)
//!   ├── index: path -> NodeId
//!   └── diff:  Option<DiffInfo>
//! ```

mod builder;
mod node;
mod object;

pub use builder::{TreeBuilder, TreeConflict};
pub use node::{FileNode, NodeId, NodeKind};
pub use object::{Compression, RemoteObjectRef};

pub(crate) use object::join_url;

use std::collections::{BTreeSet, HashMap};

use crate::game::GameTarget;

/// What a diff index says changed between two versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffInfo {
    pub base_version: String,
    pub target_version: String,
    /// Paths that did not exist in the base version.
    pub added: BTreeSet<String>,
    /// Paths present in the base version and removed in the target.
    pub deleted: Vec<String>,
}

impl DiffInfo {
    pub fn is_added(&self, path: &str) -> bool {
        self.added.contains(path)
    }
}

/// The merged, immutable file tree of a game target.
#[derive(Debug, Clone)]
pub struct FileTree {
    target: GameTarget,
    nodes: Vec<FileNode>,
    index: HashMap<String, NodeId>,
    diff: Option<DiffInfo>,
    file_count: usize,
}

impl FileTree {
    pub fn target(&self) -> &GameTarget {
        &self.target
    }

    pub fn root(&self) -> &FileNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &FileNode {
        &self.nodes[id.0]
    }

    /// Look up a node by path. Backslashes and surrounding slashes are tolerated.
    pub fn get(&self, path: &str) -> Option<&FileNode> {
        let normalized = path.replace('\\', "/");
        let key = normalized.trim_matches('/');
        self.index.get(key).map(|id| &self.nodes[id.0])
    }

    pub fn children<'a>(&'a self, node: &'a FileNode) -> impl Iterator<Item = &'a FileNode> + 'a {
        node.children.iter().map(move |id| &self.nodes[id.0])
    }

    /// Children in display order: directories first, then by name.
    pub fn listing<'a>(&'a self, node: &'a FileNode) -> Vec<&'a FileNode> {
        let mut entries: Vec<&FileNode> = self.children(node).collect();
        entries.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then_with(|| a.name.cmp(&b.name)));
        entries
    }

    /// Pre-order walk over every node below the root.
    pub fn walk(&self) -> Walk<'_> {
        let mut stack: Vec<NodeId> = self.root().children.clone();
        stack.reverse();
        Walk { tree: self, stack }
    }

    pub fn files(&self) -> impl Iterator<Item = &FileNode> + '_ {
        self.walk().filter(|n| n.is_file())
    }

    /// Every file path, sorted lexicographically.
    pub fn flatten(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.files().map(|n| n.path()).collect();
        paths.sort_unstable();
        paths
    }

    /// Files whose name or path contains `keyword`, ignoring case.
    ///
    /// An empty keyword matches nothing.
    pub fn search(&self, keyword: &str) -> Vec<&FileNode> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<&FileNode> = self
            .files()
            .filter(|n| n.path.to_lowercase().contains(&needle))
            .collect();
        hits.sort_by(|a, b| a.path.cmp(&b.path));
        hits
    }

    /// Every file at or below `prefix`, sorted by path.
    pub fn subtree(&self, prefix: &str) -> Vec<&FileNode> {
        let Some(start) = self.get(prefix) else {
            return Vec::new();
        };
        if start.is_file() {
            return vec![start];
        }

        let mut files = Vec::new();
        let mut stack = vec![start.id];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.is_file() {
                files.push(node);
            }
            stack.extend(node.children.iter().copied());
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.root().size
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    /// Diff metadata, present only when the tree was built with a diff index.
    pub fn diff(&self) -> Option<&DiffInfo> {
        self.diff.as_ref()
    }
}

/// Pre-order iterator returned by [`FileTree::walk`].
pub struct Walk<'a> {
    tree: &'a FileTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a FileNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.stack.extend(node.children.iter().rev().copied());
        Some(node)
    }
}
