//! Raw manifest documents as fetched.

use std::fmt;

use bytes::Bytes;

use crate::game::{GameTarget, VoiceLocale};

/// Which kind of index a document is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Base game files (`pkg_version`).
    PackageIndex,
    /// One locale's voice files.
    VoiceIndex(VoiceLocale),
    /// Changes relative to an older version.
    DiffIndex { base_version: String },
}

impl DocumentKind {
    /// File name of the document under its version directory.
    pub fn file_name(&self) -> String {
        match self {
            DocumentKind::PackageIndex => "pkg_version".to_string(),
            DocumentKind::VoiceIndex(locale) => locale.manifest_name(),
            DocumentKind::DiffIndex { base_version } => format!("diff_{}.json", base_version),
        }
    }

    /// Merge priority: package index first, then voices, then the diff.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            DocumentKind::PackageIndex => 0,
            DocumentKind::VoiceIndex(_) => 1,
            DocumentKind::DiffIndex { .. } => 2,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// One fetched manifest document, not yet parsed.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub target: GameTarget,
    pub kind: DocumentKind,
    /// Base URL that entry remote names are resolved against.
    pub object_base: String,
    pub bytes: Bytes,
}

impl RawDocument {
    pub fn new(
        target: GameTarget,
        kind: DocumentKind,
        object_base: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            target,
            kind,
            object_base: object_base.into(),
            bytes: bytes.into(),
        }
    }
}
