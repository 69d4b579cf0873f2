//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file: `--config <FILE>` or the platform config directory
//!    (`~/.config/filetidy/config.toml` on Linux)
//! 3. `FILETIDY_*` environment variables (`FILETIDY_IO_THREADS=8`)
//! 4. Command-line flags ([`ConfigOverrides`])

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::group::{DuplicatePolicy, GroupingMode};
use crate::scanner::WalkerConfig;

/// Database file used when nothing else is configured.
pub const DEFAULT_DATABASE: &str = "hashdata.sqlite";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "FILETIDY_";

/// Invalid configuration or operation inputs.
///
/// Raised before anything on disk is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("origin directory does not exist: {0}")]
    OriginMissing(PathBuf),

    #[error("origin is not a directory: {0}")]
    OriginNotADirectory(PathBuf),

    #[error("destination is not a directory: {0}")]
    DestinationNotADirectory(PathBuf),

    #[error("cannot resolve destination path: {0}")]
    DestinationUnresolvable(PathBuf),

    #[error("origin and destination are the same directory: {0}")]
    SameDirectory(PathBuf),

    #[error("destination {destination} is inside origin {origin}")]
    DestinationInsideOrigin { origin: PathBuf, destination: PathBuf },

    #[error("origin {origin} is inside destination {destination}")]
    OriginInsideDestination { origin: PathBuf, destination: PathBuf },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("failed to write configuration to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("cannot determine the platform configuration directory")]
    NoConfigDir,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog database file
    pub database: PathBuf,
    /// Worker threads for hashing
    pub io_threads: usize,
    /// Files hashed and committed per transaction
    pub batch_size: usize,
    pub follow_symlinks: bool,
    pub skip_hidden: bool,
    /// Skip `.git` and `GIT` directories
    pub skip_vcs_dirs: bool,
    /// Gitignore-style patterns excluded from walks
    pub ignore_patterns: Vec<String>,
    pub grouping_mode: GroupingMode,
    /// Copy files whose content is already in the destination
    pub copy_duplicates: bool,
    /// Skip deleting files changed since they were scanned
    pub verify_before_delete: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            io_threads: 4,
            batch_size: 256,
            follow_symlinks: false,
            skip_hidden: false,
            skip_vcs_dirs: true,
            ignore_patterns: Vec::new(),
            grouping_mode: GroupingMode::Extension,
            copy_duplicates: false,
            verify_before_delete: true,
        }
    }
}

/// Values set on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_symlinks: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping_mode: Option<GroupingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copy_duplicates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_before_delete: Option<bool>,
}

impl Config {
    /// Default platform-specific configuration file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "filetidy", "filetidy")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults, file and environment layers.
    ///
    /// A missing file is skipped.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file.map(Path::to_path_buf).or_else(Self::default_path) {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load every layer, apply `overrides` on top, and validate.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::FileNotFound`] if an explicit file does not exist
    /// - [`ConfigError::Load`] for malformed TOML or wrongly typed values
    /// - [`ConfigError::InvalidValue`] if validation fails
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
        }

        let config: Self = Self::figment(file)
            .merge(Serialized::globals(overrides))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;

        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "io_threads",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.database.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Walk filters described by this configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            skip_vcs_dirs: self.skip_vcs_dirs,
            ignore_patterns: self.ignore_patterns.clone(),
            ..WalkerConfig::default()
        }
    }

    #[must_use]
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.copy_duplicates {
            DuplicatePolicy::CopyAnyway
        } else {
            DuplicatePolicy::Skip
        }
    }

    /// Write this configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
