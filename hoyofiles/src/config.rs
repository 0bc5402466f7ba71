//! Engine configuration.
//!
//! Settings can be built in code or loaded from an INI file:
//!
//! ```ini
//! [source]
//! api_base = https://autopatch.hk4e.com/pkg_version, https://mirror.example/pkg_version
//! manifest_timeout_secs = 30
//!
//! [download]
//! concurrency = 4
//! connect_timeout_secs = 15
//! idle_timeout_secs = 60
//! cancel_grace_secs = 5
//!
//! [retry]
//! policy = exponential
//! max_attempts = 5
//! initial_delay_ms = 500
//! max_delay_secs = 30
//! multiplier = 2.0
//!
//! [manifest]
//! diff_schemas = 1
//! tree_cache_capacity = 8
//! ```
//!
//! Missing sections and keys keep their defaults.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::download::{RetryPolicy, TransferConfig, DEFAULT_CONCURRENCY};
use crate::manifest::DEFAULT_DIFF_SCHEMAS;

/// Default manifest API base.
pub const DEFAULT_API_BASE: &str = "https://autopatch.hk4e.com/pkg_version";

pub const DEFAULT_MANIFEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Number of parsed trees kept in memory.
pub const DEFAULT_TREE_CACHE_CAPACITY: u64 = 8;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write config file {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("config is not valid INI: {0}")]
    Syntax(String),

    #[error("invalid value `{value}` for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Everything the engine needs to know before it can fetch anything.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Manifest API bases, tried in order.
    pub api_bases: Vec<String>,
    pub manifest_timeout: Duration,
    pub connect_timeout: Duration,
    /// Workers per transfer run.
    pub concurrency: usize,
    pub transfer: TransferConfig,
    pub diff_schemas: Vec<u32>,
    pub tree_cache_capacity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_bases: vec![DEFAULT_API_BASE.to_string()],
            manifest_timeout: Duration::from_secs(DEFAULT_MANIFEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            transfer: TransferConfig::default(),
            diff_schemas: DEFAULT_DIFF_SCHEMAS.to_vec(),
            tree_cache_capacity: DEFAULT_TREE_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the mirror list. An empty list keeps the current one.
    pub fn with_api_bases<I, S>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bases: Vec<String> = bases.into_iter().map(Into::into).collect();
        if !bases.is_empty() {
            self.api_bases = bases;
        }
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.transfer.retry = retry;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn with_manifest_timeout(mut self, timeout: Duration) -> Self {
        self.manifest_timeout = timeout;
        self
    }

    pub fn with_diff_schemas(mut self, schemas: Vec<u32>) -> Self {
        self.diff_schemas = schemas;
        self
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_ini_str(&text)
    }

    /// Load `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_ini_str(text: &str) -> ConfigResult<Self> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Syntax(e.to_string()))?;
        let mut config = Self::default();

        if let Some(source) = ini.section(Some("source")) {
            if let Some(raw) = source.get("api_base") {
                let bases: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(|b| b.trim_end_matches('/').to_string())
                    .collect();
                if bases.is_empty() {
                    return Err(invalid("source", "api_base", raw, "no URL given"));
                }
                config.api_bases = bases;
            }
            if let Some(secs) = parse_key::<u64>(source, "source", "manifest_timeout_secs")? {
                config.manifest_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(download) = ini.section(Some("download")) {
            if let Some(n) = parse_key::<usize>(download, "download", "concurrency")? {
                if n == 0 {
                    return Err(invalid("download", "concurrency", "0", "must be at least 1"));
                }
                config.concurrency = n;
            }
            if let Some(secs) = parse_key::<u64>(download, "download", "connect_timeout_secs")? {
                config.connect_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = parse_key::<u64>(download, "download", "idle_timeout_secs")? {
                config.transfer.idle_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = parse_key::<u64>(download, "download", "cancel_grace_secs")? {
                config.transfer.cancel_grace = Duration::from_secs(secs);
            }
            if let Some(step) = parse_key::<u64>(download, "download", "progress_step_bytes")? {
                config.transfer.progress_step_bytes = step;
            }
        }

        if let Some(retry) = ini.section(Some("retry")) {
            config.transfer.retry = parse_retry(retry)?;
        }

        if let Some(manifest) = ini.section(Some("manifest")) {
            if let Some(raw) = manifest.get("diff_schemas") {
                config.diff_schemas = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<u32>()
                            .map_err(|e| invalid("manifest", "diff_schemas", raw, &e.to_string()))
                    })
                    .collect::<ConfigResult<_>>()?;
            }
            if let Some(n) = parse_key::<u64>(manifest, "manifest", "tree_cache_capacity")? {
                config.tree_cache_capacity = n;
            }
        }

        Ok(config)
    }

    /// Render the effective settings in the same INI layout `load` reads.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some("source"))
            .set("api_base", self.api_bases.join(", "))
            .set(
                "manifest_timeout_secs",
                self.manifest_timeout.as_secs().to_string(),
            );
        ini.with_section(Some("download"))
            .set("concurrency", self.concurrency.to_string())
            .set(
                "connect_timeout_secs",
                self.connect_timeout.as_secs().to_string(),
            )
            .set(
                "idle_timeout_secs",
                self.transfer.idle_timeout.as_secs().to_string(),
            )
            .set(
                "cancel_grace_secs",
                self.transfer.cancel_grace.as_secs().to_string(),
            )
            .set(
                "progress_step_bytes",
                self.transfer.progress_step_bytes.to_string(),
            );

        {
            let mut retry = ini.with_section(Some("retry"));
            match &self.transfer.retry {
                RetryPolicy::None => {
                    retry.set("policy", "none");
                }
                RetryPolicy::Fixed {
                    max_attempts,
                    delay,
                } => {
                    retry
                        .set("policy", "fixed")
                        .set("max_attempts", max_attempts.to_string())
                        .set("initial_delay_ms", delay.as_millis().to_string());
                }
                RetryPolicy::ExponentialBackoff {
                    max_attempts,
                    initial_delay,
                    max_delay,
                    multiplier,
                } => {
                    retry
                        .set("policy", "exponential")
                        .set("max_attempts", max_attempts.to_string())
                        .set("initial_delay_ms", initial_delay.as_millis().to_string())
                        .set("max_delay_secs", max_delay.as_secs().to_string())
                        .set("multiplier", multiplier.to_string());
                }
            }
        }

        let schemas: Vec<String> = self.diff_schemas.iter().map(u32::to_string).collect();
        ini.with_section(Some("manifest"))
            .set("diff_schemas", schemas.join(", "))
            .set("tree_cache_capacity", self.tree_cache_capacity.to_string());

        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |e: std::io::Error| ConfigError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.to_ini_string()).map_err(write_err)
    }
}

fn parse_retry(section: &Properties) -> ConfigResult<RetryPolicy> {
    let policy = section.get("policy").unwrap_or("exponential");
    let max_attempts = parse_key::<u32>(section, "retry", "max_attempts")?;
    let initial_ms = parse_key::<u64>(section, "retry", "initial_delay_ms")?;

    match policy.trim().to_ascii_lowercase().as_str() {
        "none" => Ok(RetryPolicy::None),
        "fixed" => Ok(RetryPolicy::fixed(
            max_attempts.unwrap_or(crate::download::DEFAULT_MAX_ATTEMPTS),
            Duration::from_millis(initial_ms.unwrap_or(crate::download::DEFAULT_INITIAL_DELAY_MS)),
        )),
        "exponential" => {
            let multiplier = parse_key::<f64>(section, "retry", "multiplier")?
                .unwrap_or(crate::download::DEFAULT_BACKOFF_MULTIPLIER);
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(invalid(
                    "retry",
                    "multiplier",
                    &multiplier.to_string(),
                    "must be a finite number of at least 1.0",
                ));
            }
            Ok(RetryPolicy::ExponentialBackoff {
                max_attempts: max_attempts.unwrap_or(crate::download::DEFAULT_MAX_ATTEMPTS),
                initial_delay: Duration::from_millis(
                    initial_ms.unwrap_or(crate::download::DEFAULT_INITIAL_DELAY_MS),
                ),
                max_delay: Duration::from_secs(
                    parse_key::<u64>(section, "retry", "max_delay_secs")?
                        .unwrap_or(crate::download::DEFAULT_MAX_DELAY_SECS),
                ),
                multiplier,
            })
        }
        other => Err(invalid(
            "retry",
            "policy",
            other,
            "expected none, fixed or exponential",
        )),
    }
}

fn parse_key<T>(section: &Properties, name: &str, key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match section.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, key, raw, &e.to_string())),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
