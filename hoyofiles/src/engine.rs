//! High-level facade tying manifests, selection and transfers together.
//!
//! ```text
//! catalog(game) ──► VersionCatalog ──► object base URL
//!                                         │
//! load_tree(target, locales, diff?) ──► ManifestFetcher ──► ManifestParser ──► FileTree (cached)
//!                                                                                 │
//! plan(tree, request) ──────────────────────────────────────────────────────► DownloadSet
//!                                                                                 │
//! download(set, dest) ──► DownloadOrchestrator ──► TransferStream        links(set)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use moka::future::Cache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::catalog::{CatalogArchive, VersionCatalog};
use crate::config::EngineConfig;
use crate::download::{DownloadOrchestrator, HttpTransport, Transport, TransferStream};
use crate::error::{EngineError, EngineResult};
use crate::game::{GameId, GameTarget, LocaleSelection};
use crate::links::{export, LinkSource};
use crate::manifest::{HttpManifestSource, ManifestFetcher, ManifestParser, ManifestSource};
use crate::selection::{resolve, DownloadSet, SelectionRequest};
use crate::tree::FileTree;

/// Number of version catalogs kept; one per game is plenty.
const CATALOG_CACHE_CAPACITY: u64 = 16;

/// Identity of a parsed tree.
///
/// Locales the game does not publish are dropped, so asking for them does
/// not create a second copy of the same tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TreeKey {
    target: GameTarget,
    locales: LocaleSelection,
    diff_base: Option<String>,
}

impl TreeKey {
    fn new(target: &GameTarget, locales: &LocaleSelection, diff_base: Option<&str>) -> Self {
        Self {
            target: target.clone(),
            locales: locales
                .iter()
                .filter(|l| target.game.supports_locale(*l))
                .collect(),
            diff_base: diff_base.map(str::to_string),
        }
    }
}

/// Entry point for browsing and downloading game files.
///
/// Concurrent `load_tree` calls for the same key share a single fetch and
/// parse; the result is cached until [`Engine::invalidate`].
pub struct Engine<S = HttpManifestSource, T = HttpTransport> {
    config: EngineConfig,
    fetcher: ManifestFetcher<S>,
    parser: ManifestParser,
    orchestrator: DownloadOrchestrator<T>,
    catalogs: Cache<GameId, Arc<VersionCatalog>>,
    trees: Cache<TreeKey, Arc<FileTree>>,
}

impl Engine {
    /// Build an engine that talks HTTP(S).
    pub fn from_config(config: EngineConfig) -> EngineResult<Self> {
        let source = HttpManifestSource::new(config.manifest_timeout)
            .map_err(|e| EngineError::HttpClient(e.to_string()))?;
        let transport = HttpTransport::new(config.connect_timeout)
            .map_err(|e| EngineError::HttpClient(e.to_string()))?;
        Ok(Self::with_parts(config, source, transport))
    }
}

impl<S: ManifestSource, T: Transport> Engine<S, T> {
    /// Build an engine over custom manifest and transfer backends.
    pub fn with_parts(config: EngineConfig, source: S, transport: T) -> Self {
        let fetcher = ManifestFetcher::new(source, config.api_bases.clone());
        let parser = ManifestParser::new(config.diff_schemas.clone());
        let orchestrator = DownloadOrchestrator::new(transport, config.transfer.clone());
        Self {
            fetcher,
            parser,
            orchestrator,
            catalogs: Cache::new(CATALOG_CACHE_CAPACITY),
            trees: Cache::new(config.tree_cache_capacity.max(1)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &ManifestFetcher<S> {
        &self.fetcher
    }

    /// The version catalog of `game`, fetched once and cached.
    pub async fn catalog(&self, game: GameId) -> EngineResult<Arc<VersionCatalog>> {
        self.catalogs
            .try_get_with(game, async {
                let doc = self.fetcher.fetch_version_list(game).await?;
                let catalog = VersionCatalog::parse(game, &doc.bytes)?;
                info!(game = %game, versions = catalog.len(), "Loaded version catalog");
                Ok::<_, EngineError>(Arc::new(catalog))
            })
            .await
            .map_err(unshare)
    }

    /// Drop the cached catalog of `game` and fetch it again.
    pub async fn refresh_catalog(&self, game: GameId) -> EngineResult<Arc<VersionCatalog>> {
        self.catalogs.invalidate(&game).await;
        self.catalog(game).await
    }

    /// Fetch, parse and cache the file tree of `target`.
    ///
    /// With `diff_base`, the diff from that version is merged so the tree can
    /// serve incremental selections.
    pub async fn load_tree(
        &self,
        target: &GameTarget,
        locales: &LocaleSelection,
        diff_base: Option<&str>,
    ) -> EngineResult<Arc<FileTree>> {
        let key = TreeKey::new(target, locales, diff_base);
        self.trees
            .try_get_with(key, async {
                let object_base = self.object_base(target).await?;
                let documents = self
                    .fetcher
                    .fetch_manifest_set(target, locales, diff_base, object_base.as_deref())
                    .await?;
                let tree = self.parser.parse(&documents, locales)?;
                info!(
                    target = %target,
                    files = tree.file_count(),
                    bytes = tree.total_size(),
                    "Loaded file tree"
                );
                Ok::<_, EngineError>(Arc::new(tree))
            })
            .await
            .map_err(unshare)
    }

    /// Resolve `request` against `tree`.
    pub fn plan(&self, tree: &FileTree, request: &SelectionRequest) -> EngineResult<DownloadSet> {
        Ok(resolve(tree, request)?)
    }

    /// Download set for the archives of `target`: the full game and voice
    /// packs, or the update archives from `update_from`.
    pub async fn archive_plan(
        &self,
        target: &GameTarget,
        update_from: Option<&str>,
    ) -> EngineResult<DownloadSet> {
        let archives = self.archives(target, update_from).await?;
        Ok(DownloadSet::from_archives(target.clone(), &archives)?)
    }

    /// Archives listed for `target` in the catalog.
    pub async fn archives(
        &self,
        target: &GameTarget,
        update_from: Option<&str>,
    ) -> EngineResult<Vec<CatalogArchive>> {
        let catalog = self.catalog(target.game).await?;
        let entry = catalog
            .entry(&target.version)
            .ok_or_else(|| EngineError::UnknownVersion {
                game: target.game,
                version: target.version.clone(),
            })?;
        Ok(match update_from {
            None => entry.game_archives(),
            Some(from) => entry
                .update_archives()
                .into_iter()
                .filter(|a| a.from_version.as_deref() == Some(from))
                .collect(),
        })
    }

    /// Start downloading with the configured concurrency.
    pub fn download(
        &self,
        set: DownloadSet,
        dest_root: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> TransferStream {
        self.download_with(set, dest_root, self.config.concurrency, cancel)
    }

    pub fn download_with(
        &self,
        set: DownloadSet,
        dest_root: impl Into<PathBuf>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> TransferStream {
        self.orchestrator.execute(set, dest_root, concurrency, cancel)
    }

    pub fn links<L: LinkSource + ?Sized>(&self, source: &L) -> Vec<String> {
        export(source)
    }

    /// Forget every cached catalog, tree and validator.
    pub fn invalidate(&self) {
        self.catalogs.invalidate_all();
        self.trees.invalidate_all();
        self.fetcher.clear_validators();
        debug!("Engine caches invalidated");
    }

    /// Base URL for decompressed files of `target`, if the catalog names one.
    ///
    /// A catalog that cannot be fetched or parsed fails the request. Only a
    /// catalog without a decompressed path for the version falls back to the
    /// manifest's own directory.
    async fn object_base(&self, target: &GameTarget) -> EngineResult<Option<String>> {
        let catalog = self.catalog(target.game).await?;
        let base = catalog
            .entry(&target.version)
            .and_then(|e| e.decompressed_base())
            .map(str::to_string);
        if base.is_none() {
            debug!(target = %target, "Catalog has no decompressed path, resolving files against manifest directory");
        }
        Ok(base)
    }
}

fn unshare(err: Arc<EngineError>) -> EngineError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| (*shared).clone())
}
