//! Tracing subscriber setup.
//!
//! The filter comes from `HOYO_LOG_LEVEL` (`DEBUG`, `INFO`, `WARNING`,
//! `ERROR`, `CRITICAL`), then `RUST_LOG`, then `error`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "HOYO_LOG_LEVEL";

const DEFAULT_DIRECTIVE: &str = "error";

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Explicit filter directive; overrides the environment.
    pub directive: Option<String>,
    /// Directory for a daily-rolling log file. Logs go to stderr when unset.
    pub log_dir: Option<PathBuf>,
    pub file_prefix: Option<String>,
}

/// Map a `HOYO_LOG_LEVEL` value to a filter directive.
///
/// `CRITICAL` has no tracing counterpart and maps to `error`.
pub fn level_directive(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARNING" | "WARN" => Some("warn"),
        "ERROR" | "CRITICAL" => Some("error"),
        _ => None,
    }
}

fn resolve_filter(config: &LogConfig) -> EnvFilter {
    if let Some(directive) = &config.directive {
        if let Ok(filter) = EnvFilter::try_new(directive) {
            return filter;
        }
    }
    if let Some(directive) = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|level| level_directive(&level))
    {
        return EnvFilter::new(directive);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// Returns the file writer guard when logging to a file; keep it alive for
/// the life of the process or buffered lines are lost. Calling this twice
/// is harmless: the second subscriber is simply not installed.
pub fn init(config: &LogConfig) -> std::io::Result<Option<WorkerGuard>> {
    let filter = resolve_filter(config);

    match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let prefix = config.file_prefix.as_deref().unwrap_or("hoyofiles.log");
            let appender = tracing_appender::rolling::daily(dir, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .try_init();
            Ok(Some(guard))
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(level_directive("DEBUG"), Some("debug"));
        assert_eq!(level_directive("info"), Some("info"));
        assert_eq!(level_directive("WARNING"), Some("warn"));
        assert_eq!(level_directive("CRITICAL"), Some("error"));
        assert_eq!(level_directive("verbose"), None);
    }

    #[test]
    fn test_file_logging_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LogConfig {
            directive: Some("debug".into()),
            log_dir: Some(log_dir.clone()),
            file_prefix: None,
        };
        let guard = init(&config).unwrap();
        assert!(guard.is_some());
        assert!(log_dir.is_dir());
    }
}
