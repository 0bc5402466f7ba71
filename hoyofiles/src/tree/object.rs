//! Remote object references.

use crate::integrity::Checksum;

/// How a remote object is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Zip,
    SevenZip,
    Zstd,
}

impl Compression {
    /// Infer compression from a file name or URL.
    ///
    /// Split archive volumes such as `game.zip.001` are classified by the
    /// extension before the volume number.
    pub fn from_name(name: &str) -> Self {
        let file = name.rsplit('/').next().unwrap_or(name);
        let file = file.split(['?', '#']).next().unwrap_or(file).to_ascii_lowercase();

        let mut stem = file.as_str();
        if let Some((head, tail)) = stem.rsplit_once('.') {
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
                stem = head;
            }
        }

        if stem.ends_with(".zip") {
            Compression::Zip
        } else if stem.ends_with(".7z") {
            Compression::SevenZip
        } else if stem.ends_with(".zst") || stem.ends_with(".zstd") {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

/// Everything needed to fetch and verify one remote file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteObjectRef {
    /// Absolute download URL.
    pub url: String,
    /// Exact size of the object in bytes.
    pub size_bytes: u64,
    /// Declared content checksum.
    pub checksum: Checksum,
    pub compression: Compression,
    /// True for diff payloads that patch an older file rather than replace it.
    pub is_diff_patch: bool,
}

impl RemoteObjectRef {
    pub fn new(url: impl Into<String>, size_bytes: u64, checksum: Checksum) -> Self {
        let url = url.into();
        let compression = Compression::from_name(&url);
        Self {
            url,
            size_bytes,
            checksum,
            compression,
            is_diff_patch: false,
        }
    }

    pub fn as_diff_patch(mut self) -> Self {
        self.is_diff_patch = true;
        self
    }

    /// Last path segment of the URL.
    pub fn file_name(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// Join an object base URL and a relative remote name.
pub(crate) fn join_url(base: &str, remote_name: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        remote_name.trim_start_matches('/')
    )
}
