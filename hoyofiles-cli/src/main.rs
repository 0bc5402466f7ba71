//! HoyoFiles CLI - Command-line interface
//!
//! Browse published manifests, export download links and download verified
//! game files.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hoyofiles::game::GameId;
use hoyofiles::logging::{self, LogConfig};
use hoyofiles::Engine;

use commands::common::{load_config, FilterArgs, TargetArgs};
use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "hoyofiles", version, about = "Browse and download HoYoverse game files")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Manifest API base; repeat to add mirrors
    #[arg(long = "api-base", global = true)]
    api_bases: Vec<String>,

    /// Log filter (overrides HOYO_LOG_LEVEL), e.g. "debug" or "hoyofiles=info"
    #[arg(long, global = true)]
    log: Option<String>,

    /// Write logs to daily files in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List published versions of a game
    Versions {
        /// Game code: hk4e, hkrpg, nap or bh3
        game: GameId,

        /// Ignore the cached catalog
        #[arg(long)]
        refresh: bool,
    },

    /// List the archives published for a version
    Packages {
        #[command(flatten)]
        target: TargetArgs,

        /// Show update archives from this version instead
        #[arg(long)]
        update_from: Option<String>,
    },

    /// Browse or search the file tree of a version
    Tree {
        #[command(flatten)]
        target: TargetArgs,

        /// Directory or file to show
        #[arg(long)]
        path: Option<String>,

        /// List files whose path contains this text
        #[arg(long, short = 's')]
        search: Option<String>,

        /// Merge the diff from this version
        #[arg(long)]
        diff_from: Option<String>,
    },

    /// Print download URLs, one per line
    Links {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// List archive URLs instead of individual files
        #[arg(long)]
        archives: bool,

        /// List update archive URLs from this version
        #[arg(long, conflicts_with = "diff_from")]
        update_from: Option<String>,

        /// Write the list to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Download files into a directory, resuming earlier runs
    Download {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Destination directory
        #[arg(long, short = 'd')]
        dest: Option<PathBuf>,

        /// Parallel transfers
        #[arg(long, short = 'j')]
        concurrency: Option<usize>,

        /// Download archives instead of individual files
        #[arg(long)]
        archives: bool,

        /// Download update archives from this version
        #[arg(long, conflicts_with = "diff_from")]
        update_from: Option<String>,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig {
        directive: cli.log.clone(),
        log_dir: cli.log_dir.clone(),
        file_prefix: None,
    };
    let _guard = match logging::init(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: cannot set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli {
        config,
        api_bases,
        command,
        ..
    } = cli;
    if let Commands::Config(command) = command {
        return commands::config::run(command, config.as_deref());
    }

    let engine = Engine::from_config(load_config(config.as_deref())?.with_api_bases(api_bases))?;

    match command {
        Commands::Versions { game, refresh } => {
            commands::versions::run(&engine, game, refresh).await
        }
        Commands::Packages {
            target,
            update_from,
        } => commands::packages::run(&engine, &target, update_from.as_deref()).await,
        Commands::Tree {
            target,
            path,
            search,
            diff_from,
        } => {
            commands::tree::run(
                &engine,
                &target,
                path.as_deref(),
                search.as_deref(),
                diff_from.as_deref(),
            )
            .await
        }
        Commands::Links {
            target,
            filter,
            archives,
            update_from,
            output,
        } => {
            commands::links::run(
                &engine,
                &target,
                &filter,
                archives,
                update_from.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Commands::Download {
            target,
            filter,
            dest,
            concurrency,
            archives,
            update_from,
        } => {
            commands::download::run(
                &engine,
                DownloadArgs {
                    target,
                    filter,
                    dest,
                    concurrency,
                    archives,
                    update_from,
                },
            )
            .await
        }
        Commands::Config(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_download_arguments() {
        let cli = Cli::try_parse_from([
            "hoyofiles", "download", "hk4e", "5.0.0", "-l", "en", "-l", "ja", "--prefix", "Audio",
            "-j", "8",
        ])
        .unwrap();
        match cli.command {
            Commands::Download {
                target,
                filter,
                concurrency,
                ..
            } => {
                assert_eq!(target.game, GameId::Genshin);
                assert_eq!(target.version.as_deref(), Some("5.0.0"));
                assert_eq!(target.locale_selection().len(), 2);
                assert_eq!(filter.prefix.as_deref(), Some("Audio"));
                assert_eq!(concurrency, Some(8));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_game() {
        assert!(Cli::try_parse_from(["hoyofiles", "versions", "minecraft"]).is_err());
    }
}
