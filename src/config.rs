//! Configuration for the logger
//!
//! The logger is configured from a flat map of string keys to string values:
//!
//! | key | meaning |
//! |---|---|
//! | `writers` | comma-separated sinks: `console`, `file` (default `console`) |
//! | `log_level` | `debug`, `info`, `warn`, `error` or `fatal` |
//! | `log_file` | base path of the file sink |
//! | `max_size` | rotation size, integer with optional `K`/`M`/`G` suffix (default unit `M`) |
//! | `file_number` | rotated files to keep, 1 to 999 (default 10) |
//!
//! Bad values never fail initialization: they are reported on the diagnostic
//! channel and replaced by their default.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostic::diagnostic;
use crate::level::Level;
use crate::sink::{DEFAULT_RETAIN_COUNT, DEFAULT_ROTATE_SIZE};

pub const KEY_WRITERS: &str = "writers";
pub const KEY_LOG_LEVEL: &str = "log_level";
pub const KEY_LOG_FILE: &str = "log_file";
pub const KEY_MAX_SIZE: &str = "max_size";
pub const KEY_FILE_NUMBER: &str = "file_number";

/// Recoverable configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),
    #[error("log file size config error '{0}'")]
    InvalidSize(String),
    #[error("log file reserve number config error '{0}'")]
    InvalidFileNumber(String),
}

/// A sink that can be activated from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterKind {
    Console,
    File,
}

impl WriterKind {
    /// Registry name of the sink
    pub fn name(&self) -> &'static str {
        match self {
            WriterKind::Console => crate::sink::CONSOLE_SINK,
            WriterKind::File => crate::sink::FILE_SINK,
        }
    }

    /// Parse a writer name, ignoring case and surrounding whitespace
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "console" => Some(WriterKind::Console),
            "file" => Some(WriterKind::File),
            _ => None,
        }
    }
}

/// Typed logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Sinks to activate, without duplicates
    #[serde(default = "default_writers")]
    pub writers: Vec<WriterKind>,

    /// Level threshold
    #[serde(default = "default_level")]
    pub level: Level,

    /// Base path of the file sink
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Rotation size in bytes
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Number of rotated files to keep
    #[serde(default = "default_file_number")]
    pub file_number: usize,
}

fn default_writers() -> Vec<WriterKind> {
    vec![WriterKind::Console]
}

fn default_level() -> Level {
    Level::Debug
}

fn default_max_size() -> u64 {
    DEFAULT_ROTATE_SIZE
}

fn default_file_number() -> usize {
    DEFAULT_RETAIN_COUNT
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            writers: default_writers(),
            level: default_level(),
            log_file: None,
            max_size: default_max_size(),
            file_number: default_file_number(),
        }
    }
}

impl LoggerConfig {
    /// Build a configuration from a flat option map.
    ///
    /// Unknown writer names are ignored. Every other bad value is reported on
    /// the diagnostic channel and replaced by its default.
    pub fn from_options(options: &HashMap<String, String>) -> Self {
        let option = |key: &str| {
            options
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(level) = option(KEY_LOG_LEVEL) {
            match level.parse() {
                Ok(level) => config.level = level,
                Err(e) => diagnostic!("{}. use default level: {}", e, config.level),
            }
        }

        config.log_file = option(KEY_LOG_FILE).map(expand_path);

        let mut writers = Vec::new();
        for kind in option(KEY_WRITERS)
            .unwrap_or_default()
            .split(',')
            .filter_map(WriterKind::parse)
        {
            if kind == WriterKind::File && config.log_file.is_none() {
                diagnostic!("file writer requested without {}. skipped", KEY_LOG_FILE);
                continue;
            }
            if !writers.contains(&kind) {
                writers.push(kind);
            }
        }
        if !writers.is_empty() {
            config.writers = writers;
        }

        if let Some(size) = option(KEY_MAX_SIZE) {
            config.max_size = match parse_size(size) {
                Ok(0) => DEFAULT_ROTATE_SIZE,
                Ok(bytes) => bytes,
                Err(e) => {
                    diagnostic!("{}. use default size: 100M", e);
                    DEFAULT_ROTATE_SIZE
                }
            };
        }

        if let Some(number) = option(KEY_FILE_NUMBER) {
            config.file_number = parse_file_number(number).unwrap_or_else(|e| {
                diagnostic!("{}. use default: {}", e, DEFAULT_RETAIN_COUNT);
                DEFAULT_RETAIN_COUNT
            });
        }

        config
    }

    /// Convert back to the flat option map
    pub fn to_options(&self) -> HashMap<String, String> {
        let mut options = HashMap::new();
        let writers: Vec<_> = self.writers.iter().map(WriterKind::name).collect();
        options.insert(KEY_WRITERS.to_string(), writers.join(","));
        options.insert(
            KEY_LOG_LEVEL.to_string(),
            self.level.as_str().to_lowercase(),
        );
        if let Some(path) = &self.log_file {
            options.insert(KEY_LOG_FILE.to_string(), path.display().to_string());
        }
        options.insert(KEY_MAX_SIZE.to_string(), format!("{}K", self.max_size / 1024));
        options.insert(KEY_FILE_NUMBER.to_string(), self.file_number.to_string());
        options
    }
}

/// Parse a size such as `150k`, `10M` or `1g` into bytes.
///
/// The suffix is case-insensitive and scales by 1024, 1024² or 1024³. Without
/// a recognized suffix the number is taken as megabytes; any other trailing
/// letter is dropped and megabytes are used as well.
pub fn parse_size(value: &str) -> Result<u64, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::InvalidSize(value.to_string());

    let (digits, multiplier) = match value.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => {
            let multiplier = match c.to_ascii_uppercase() {
                'K' => 1024,
                'G' => 1024 * 1024 * 1024,
                _ => 1024 * 1024,
            };
            (&value[..value.len() - 1], multiplier)
        }
        Some(_) => (value, 1024 * 1024),
        None => return Err(invalid()),
    };

    let base: u64 = digits.trim().parse().map_err(|_| invalid())?;
    base.checked_mul(multiplier).ok_or_else(invalid)
}

/// Parse the number of rotated files to keep.
///
/// Values outside `1..=999` fall back to the default without an error.
pub fn parse_file_number(value: &str) -> Result<usize, ConfigError> {
    let number: i64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidFileNumber(value.to_string()))?;
    Ok(match usize::try_from(number) {
        Ok(n) if (1..1000).contains(&n) => n,
        _ => DEFAULT_RETAIN_COUNT,
    })
}

/// Expand `~` and environment variables in a configured path
fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// Load a flat option map from a TOML file.
///
/// Only top-level scalar values are kept; they are converted to strings.
pub fn load_options(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_options(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Parse a flat option map from TOML text
pub fn parse_options(content: &str) -> Result<HashMap<String, String>> {
    let table: toml::Table = toml::from_str(content)?;
    let mut options = HashMap::new();
    for (key, value) in table {
        let value = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            other => {
                tracing::warn!("Ignoring non-scalar config value for '{}': {}", key, other);
                continue;
            }
        };
        options.insert(key, value);
    }
    Ok(options)
}
