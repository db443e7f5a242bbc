use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::export::DEFAULT_EXPORT_SESSION_LIMIT;
use crate::utils::{self, PathError};

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Overrides portable mode and the per-user data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Filter for the log file, in `RUST_LOG` syntax
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_session_list_limit")]
    pub session_list_limit: usize,
    #[serde(default = "default_export_session_limit")]
    pub export_session_limit: usize,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: default_log_level(),
            session_list_limit: default_session_list_limit(),
            export_session_limit: default_export_session_limit(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_list_limit() -> usize {
    100
}

fn default_export_session_limit() -> usize {
    DEFAULT_EXPORT_SESSION_LIMIT
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error(transparent)]
    PathError(#[from] PathError),
}

impl Config {
    /// Load configuration from the profile's config file, or create it with defaults
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific file, writing defaults there if it is missing
    pub fn load_from_path(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let mut config = Config::default();
            config.save_to_path(config_path)?;
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub fn save_to_path(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Resolve (and create) the data directory for this configuration
    pub fn data_dir(&self, profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        Ok(utils::resolve_data_dir(profile, self.data_dir.as_deref())?)
    }

    /// Path of the database file inside the data directory
    pub fn database_path(&self, profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir(profile)?.join(utils::DB_FILENAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_keys_use_defaults() {
        let config: Config = toml::from_str("log_level = \"debug\"").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.session_list_limit, 100);
        assert_eq!(config.export_session_limit, 1000);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("config.toml");

        let config = Config::load_from_path(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_version, Some(CURRENT_CONFIG_VERSION));

        let reloaded = Config::load_from_path(&path).unwrap();
        assert_eq!(reloaded.log_level, config.log_level);
    }

    #[test]
    fn test_data_dir_override() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("planner-data");
        let config = Config {
            data_dir: Some(data.to_string_lossy().to_string()),
            ..Config::default()
        };

        let db_path = config.database_path(utils::Profile::Prod).unwrap();
        assert_eq!(db_path, data.join("planner.db"));
        assert!(data.is_dir());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_level = [").unwrap();
        assert!(matches!(Config::load_from_path(&path), Err(ConfigError::ParseError(_))));
    }
}
