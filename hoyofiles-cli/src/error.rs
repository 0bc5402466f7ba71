//! CLI error type.

use std::fmt;

use hoyofiles::config::ConfigError;
use hoyofiles::EngineError;

/// Errors reported to the user before exiting non-zero.
#[derive(Debug)]
pub enum CliError {
    /// Engine failure (fetch, parse, selection, catalog).
    Engine(EngineError),

    /// Invalid or unreadable configuration.
    Config(String),

    /// Bad command-line input that clap could not catch.
    Usage(String),

    /// Some entries of a download did not complete.
    Incomplete { failed: usize, pending: usize },

    /// Local I/O outside the engine, e.g. writing a link list.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Engine(e) => write!(f, "{}", e),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Incomplete { failed, pending } => write!(
                f,
                "Download incomplete: {} failed, {} not finished",
                failed, pending
            ),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Engine(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
