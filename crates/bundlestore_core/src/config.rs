//! Store configuration file.
//!
//! # Responsibility
//! - Load or initialize `bundlestore.json` in a base directory.
//! - Resolve the database path and history bounds handed to services.
//!
//! # Invariants
//! - A loaded config has passed `validate()`.
//! - Relative paths are resolved against the config base directory.

use crate::logging::default_log_level;
use crate::repo::shell_repo::{HistoryLimits, HISTORY_DEFAULT_LIMIT, HISTORY_LIMIT_MAX};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "bundlestore.json";
const DEFAULT_DATABASE_NAME: &str = "bundlestore.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "logs";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "config io error at `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "config parse error at `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Persisted store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file; relative paths resolve against the config directory.
    pub database_path: String,
    pub log_level: String,
    /// Log directory; relative paths resolve against the config directory.
    pub log_dir: String,
    pub history_default_limit: u32,
    pub history_max_limit: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_NAME.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: DEFAULT_LOG_DIR_NAME.to_string(),
            history_default_limit: HISTORY_DEFAULT_LIMIT,
            history_max_limit: HISTORY_LIMIT_MAX,
        }
    }
}

impl StoreConfig {
    /// Reads `bundlestore.json` from `base_dir`, writing defaults when absent.
    pub fn load_or_init(base_dir: &Path) -> ConfigResult<Self> {
        fs::create_dir_all(base_dir).map_err(|source| ConfigError::Io {
            path: base_dir.to_path_buf(),
            source,
        })?;

        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            return Self::load(&config_path);
        }

        let config = Self::default();
        let payload = serde_json::to_string_pretty(&config).map_err(|source| {
            ConfigError::Parse {
                path: config_path.clone(),
                source,
            }
        })?;
        fs::write(&config_path, payload).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        Ok(config)
    }

    /// Reads and validates one config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: StoreConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path must not be blank".to_string(),
            ));
        }
        if self.history_default_limit == 0 || self.history_max_limit == 0 {
            return Err(ConfigError::Invalid(
                "history limits must be greater than zero".to_string(),
            ));
        }
        if self.history_default_limit > self.history_max_limit {
            return Err(ConfigError::Invalid(format!(
                "history_default_limit {} exceeds history_max_limit {}",
                self.history_default_limit, self.history_max_limit
            )));
        }
        Ok(())
    }

    pub fn database_path(&self, base_dir: &Path) -> PathBuf {
        resolve_path(base_dir, &self.database_path)
    }

    pub fn log_dir(&self, base_dir: &Path) -> PathBuf {
        resolve_path(base_dir, &self.log_dir)
    }

    pub fn history_limits(&self) -> HistoryLimits {
        HistoryLimits {
            default_limit: self.history_default_limit,
            max_limit: self.history_max_limit,
        }
    }
}

fn resolve_path(base_dir: &Path, value: &str) -> PathBuf {
    let candidate = PathBuf::from(value.trim());
    if candidate.is_absolute() {
        candidate
    } else {
        base_dir.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig, DEFAULT_CONFIG_NAME};

    #[test]
    fn load_or_init_writes_defaults_then_reads_them_back() {
        let dir = tempfile::tempdir().unwrap();

        let created = StoreConfig::load_or_init(dir.path()).unwrap();
        assert!(dir.path().join(DEFAULT_CONFIG_NAME).exists());

        let loaded = StoreConfig::load_or_init(dir.path()).unwrap();
        assert_eq!(created, loaded);
        assert_eq!(
            loaded.database_path(dir.path()),
            dir.path().join("bundlestore.sqlite3")
        );
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_NAME);
        std::fs::write(&path, r#"{ "history_max_limit": 500 }"#).unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.history_max_limit, 500);
        assert_eq!(config.history_limits().normalize(Some(900)), 500);
    }

    #[test]
    fn default_limit_above_max_is_rejected() {
        let config = StoreConfig {
            history_default_limit: 50,
            history_max_limit: 10,
            ..StoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            StoreConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
