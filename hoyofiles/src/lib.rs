//! HoyoFiles - Manifest browsing and verified downloads for HoYoverse games
//!
//! This library fetches a game version's manifests, merges them into a
//! browsable file tree, resolves a selection of that tree into a download
//! set and fetches the set concurrently with resume and checksum
//! verification.
//!
//! # Modules
//!
//! - [`game`]: game identifiers, targets, voice locales and version tags
//! - [`catalog`]: the per-game version catalog and its archives
//! - [`manifest`]: fetching and parsing manifest documents
//! - [`tree`]: the merged, immutable file tree
//! - [`selection`]: turning a tree and a request into a download set
//! - [`download`]: the concurrent transfer engine
//! - [`integrity`]: checksums and streaming verification
//! - [`links`]: URL export for external download managers
//! - [`engine`]: a facade over all of the above
//!
//! # Example
//!
//! ```no_run
//! use hoyofiles::{Engine, EngineConfig, GameId, GameTarget, LocaleSelection, SelectionRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), hoyofiles::EngineError> {
//! let engine = Engine::from_config(EngineConfig::default())?;
//! let target = GameTarget::new(GameId::Genshin, "5.0.0");
//! let tree = engine.load_tree(&target, &LocaleSelection::none(), None).await?;
//! let set = engine.plan(&tree, &SelectionRequest::full())?;
//! let report = engine
//!     .download(set, "/tmp/genshin", CancellationToken::new())
//!     .into_report()
//!     .await;
//! println!("{} of {} files done", report.done_count(), report.states.len());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod game;
pub mod integrity;
pub mod links;
pub mod logging;
pub mod manifest;
pub mod selection;
pub mod tree;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use game::{GameId, GameTarget, LocaleSelection, VoiceLocale};
pub use selection::{DownloadSet, PathFilter, SelectionMode, SelectionRequest};
pub use tree::{FileNode, FileTree};
