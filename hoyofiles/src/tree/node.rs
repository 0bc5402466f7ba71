//! Tree nodes.

use super::RemoteObjectRef;
use crate::game::VoiceLocale;

/// Index of a node inside its [`super::FileTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// A file or directory in a [`super::FileTree`].
///
/// Files carry the object needed to reproduce them in full and, when the
/// tree was built with a diff, the patch object that upgrades an older copy.
/// Directory sizes are the sum of every file below them.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub(crate) id: NodeId,
    pub(crate) path: String,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) size: u64,
    pub(crate) object: Option<RemoteObjectRef>,
    pub(crate) patch: Option<RemoteObjectRef>,
    pub(crate) locale: Option<VoiceLocale>,
    pub(crate) content_hash: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl FileNode {
    pub(crate) fn directory(id: NodeId, path: String, name: String, parent: Option<NodeId>) -> Self {
        Self {
            id,
            path,
            name,
            kind: NodeKind::Directory,
            size: 0,
            object: None,
            patch: None,
            locale: None,
            content_hash: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Normalized `/`-separated path relative to the game root; empty for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// File size, or aggregate size of everything below a directory.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Full object for a file; `None` for directories.
    pub fn object(&self) -> Option<&RemoteObjectRef> {
        self.object.as_ref()
    }

    /// Diff payload upgrading the previous version of this file, if any.
    pub fn patch(&self) -> Option<&RemoteObjectRef> {
        self.patch.as_ref()
    }

    /// Voice locale the file belongs to; `None` for base game content.
    pub fn locale(&self) -> Option<VoiceLocale> {
        self.locale
    }

    /// Secondary content hash published alongside the checksum, if any.
    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }
}
