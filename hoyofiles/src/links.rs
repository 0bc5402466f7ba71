//! Plain URL export for external download managers.

use crate::catalog::CatalogArchive;
use crate::selection::DownloadSet;
use crate::tree::FileNode;

/// Anything that can be listed as download URLs.
pub trait LinkSource {
    /// URLs in listing order; directories contribute nothing.
    fn links(&self) -> Vec<String>;
}

impl LinkSource for DownloadSet {
    fn links(&self) -> Vec<String> {
        self.entries().iter().map(|e| e.object.url.clone()).collect()
    }
}

/// A tree subset, e.g. the result of [`crate::tree::FileTree::search`].
impl LinkSource for [&FileNode] {
    fn links(&self) -> Vec<String> {
        self.iter()
            .filter_map(|node| node.object())
            .map(|object| object.url.clone())
            .collect()
    }
}

impl LinkSource for [CatalogArchive] {
    fn links(&self) -> Vec<String> {
        self.iter().map(|a| a.package.url.clone()).collect()
    }
}

/// Export the URLs of `source`.
pub fn export<L: LinkSource + ?Sized>(source: &L) -> Vec<String> {
    source.links()
}

/// One URL per line, for pasting into a download manager.
pub fn to_clipboard_text(links: &[String]) -> String {
    links.join("\n")
}
