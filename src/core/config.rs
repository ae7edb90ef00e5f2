//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.bookhaven/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::SortOrder;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BookHavenConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_sort: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    pub data_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const CONFIG_DIR: &str = ".bookhaven";
pub const DEFAULT_DATA_FILE: &str = "books.json";
pub const DEFAULT_LOG_FILE: &str = "bookhaven.log";
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

pub const ENV_DATA_FILE: &str = "BOOKHAVEN_DATA_FILE";
pub const ENV_LOG_LEVEL: &str = "BOOKHAVEN_LOG_LEVEL";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub default_sort: SortOrder,
    pub data_file: PathBuf,
    pub log_level: LevelFilter,
    pub log_file: PathBuf,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// `~/.bookhaven`, or `None` when there is no home directory.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_DIR))
}

/// Returns the path to `~/.bookhaven/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.bookhaven/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `BookHavenConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<BookHavenConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(BookHavenConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(BookHavenConfig::default());
    }

    load_config_from(&path)
}

/// Parses the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<BookHavenConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: BookHavenConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# BookHaven Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_sort = "date_added"        # "date_added" or "name"

# [storage]
# data_file = "/home/me/.bookhaven/books.json"   # Or set BOOKHAVEN_DATA_FILE, or pass --data-file

# [logging]
# level = "info"                     # "off", "error", "warn", "info", "debug", "trace"; or BOOKHAVEN_LOG_LEVEL
# file = "/home/me/.bookhaven/bookhaven.log"
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_data_file` and `cli_sort` are from CLI flags (None = not specified).
pub fn resolve(
    config: &BookHavenConfig,
    cli_data_file: Option<&Path>,
    cli_sort: Option<SortOrder>,
) -> ResolvedConfig {
    resolve_with_env(config, cli_data_file, cli_sort, |key| std::env::var(key).ok())
}

fn resolve_with_env(
    config: &BookHavenConfig,
    cli_data_file: Option<&Path>,
    cli_sort: Option<SortOrder>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let base_dir = config_dir().unwrap_or_else(|| PathBuf::from("."));

    // Sort: CLI → config → default
    let default_sort = cli_sort
        .or(config.general.default_sort)
        .unwrap_or_default();

    // Data file: CLI → env → config → default
    let data_file = cli_data_file
        .map(Path::to_path_buf)
        .or_else(|| env(ENV_DATA_FILE).map(PathBuf::from))
        .or_else(|| config.storage.data_file.clone())
        .unwrap_or_else(|| base_dir.join(DEFAULT_DATA_FILE));

    // Log level: env → config → default
    let log_level = env(ENV_LOG_LEVEL)
        .or_else(|| config.logging.level.clone())
        .map(|level| parse_level(&level))
        .unwrap_or(DEFAULT_LOG_LEVEL);

    // Log file: config → next to the data file
    let log_file = config.logging.file.clone().unwrap_or_else(|| {
        data_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.join(DEFAULT_LOG_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    });

    ResolvedConfig {
        default_sort,
        data_file,
        log_level,
        log_file,
    }
}

fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or_else(|_| {
        warn!("Unknown log level {:?}, using {}", level, DEFAULT_LOG_LEVEL);
        DEFAULT_LOG_LEVEL
    })
}
