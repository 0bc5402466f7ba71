//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use clap::Args;
use hoyofiles::config::EngineConfig;
use hoyofiles::game::{GameId, GameTarget, LocaleSelection, VoiceLocale, DEFAULT_BRANCH};
use hoyofiles::selection::{PathFilter, SelectionRequest};
use hoyofiles::Engine;

use crate::error::CliError;

/// Options selecting a game version and its voice packs.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Game code: hk4e, hkrpg, nap or bh3
    pub game: GameId,

    /// Version tag; defaults to the newest published version
    pub version: Option<String>,

    /// Release branch
    #[arg(long, default_value = DEFAULT_BRANCH)]
    pub branch: String,

    /// Voice locale to include (zh, en, ja, ko); repeat for several
    #[arg(long = "locale", short = 'l')]
    pub locales: Vec<VoiceLocale>,

    /// Include every voice locale the game publishes
    #[arg(long, conflicts_with = "locales")]
    pub all_locales: bool,
}

impl TargetArgs {
    pub fn locale_selection(&self) -> LocaleSelection {
        if self.all_locales {
            LocaleSelection::all_for(self.game)
        } else {
            self.locales.iter().copied().collect()
        }
    }

    /// Resolve the target, looking up the newest version when none was given.
    pub async fn resolve(&self, engine: &Engine) -> Result<GameTarget, CliError> {
        let version = match &self.version {
            Some(v) => v.clone(),
            None => {
                let catalog = engine.catalog(self.game).await?;
                catalog
                    .latest()
                    .map(|v| v.as_str().to_string())
                    .ok_or_else(|| {
                        CliError::Usage(format!("No published versions found for {}", self.game))
                    })?
            }
        };
        Ok(GameTarget::new(self.game, version).with_branch(self.branch.clone()))
    }
}

/// Options narrowing which files of a tree are selected.
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Only files at or below this path
    #[arg(long, conflicts_with = "contains")]
    pub prefix: Option<String>,

    /// Only files whose path contains this text (case-insensitive)
    #[arg(long)]
    pub contains: Option<String>,

    /// Select only what changed since this version
    #[arg(long)]
    pub diff_from: Option<String>,
}

impl FilterArgs {
    pub fn request(&self) -> SelectionRequest {
        let request = match &self.diff_from {
            Some(base) => SelectionRequest::incremental(base.clone()),
            None => SelectionRequest::full(),
        };
        match (&self.prefix, &self.contains) {
            (Some(prefix), _) => request.with_filter(PathFilter::Prefix(prefix.clone())),
            (None, Some(text)) => request.with_filter(PathFilter::Contains(text.clone())),
            (None, None) => request,
        }
    }
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hoyofiles")
        .join("config.ini")
}

/// Load the configuration from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::load_or_default(&config_file_path())?),
    }
}

/// Default download directory for a target.
pub fn default_download_dir(target: &GameTarget) -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hoyofiles")
        .join(target.game.code())
        .join(&target.version)
}

/// Format a byte count for display.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
