//! Configuration CLI commands.

use std::path::Path;

use clap::Subcommand;
use hoyofiles::config::EngineConfig;

use super::common::{config_file_path, load_config};
use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,
}

pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    let file = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Show => {
            let config = load_config(path)?;
            print!("{}", config.to_ini_string());
            Ok(())
        }
        ConfigCommands::Init { force } => {
            if file.exists() && !force {
                return Err(CliError::Config(format!(
                    "{} already exists. Use --force to overwrite it.",
                    file.display()
                )));
            }
            EngineConfig::default().save(&file)?;
            println!("Wrote {}", file.display());
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", file.display());
            Ok(())
        }
    }
}
