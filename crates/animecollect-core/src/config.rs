use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::CollectError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Bounds applied to `catalog.timeout_secs`.
const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 30;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_filter: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_filter: "animecollect=info".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory location.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub page_limit: u32,
    /// Serve built-in sample titles instead of calling the network.
    pub offline_demo: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://kitsu.io/api/edge".into(),
            timeout_secs: 8,
            page_limit: 20,
            offline_demo: false,
        }
    }
}

impl CatalogConfig {
    /// Request timeout, clamped so a catalog call can never hang the caller.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
    }
}

impl AppConfig {
    /// Load config: user file (if exists), otherwise built-in defaults.
    pub fn load() -> Result<Self, CollectError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            let user_str = std::fs::read_to_string(&user_path)?;
            Self::from_toml(&user_str)
        } else {
            Self::from_toml(DEFAULT_CONFIG)
        }
    }

    pub fn from_toml(s: &str) -> Result<Self, CollectError> {
        toml::from_str(s).map_err(|e| CollectError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, CollectError> {
        toml::to_string_pretty(self).map_err(|e| CollectError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<PathBuf, CollectError> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CollectError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the database file, honouring `storage.database_path`.
    pub fn db_path(&self) -> PathBuf {
        if let Some(path) = &self.storage.database_path {
            return path.clone();
        }
        Self::project_dirs()
            .map(|d| d.data_dir().join("animecollect.db"))
            .unwrap_or_else(|| PathBuf::from("animecollect.db"))
    }

    /// Ensure the database's parent directory exists and return the DB path.
    pub fn ensure_db_path(&self) -> Result<PathBuf, CollectError> {
        let path = self.db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Directory for rolling log files.
    pub fn log_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "animecollect")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.general.log_filter, "animecollect=info");
        assert_eq!(config.catalog.timeout_secs, 8);
        assert_eq!(config.catalog.page_limit, 20);
        assert!(!config.catalog.offline_demo);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let config = AppConfig::from_toml("[catalog]\noffline_demo = true\n").unwrap();
        assert!(config.catalog.offline_demo);
        assert_eq!(config.catalog.base_url, "https://kitsu.io/api/edge");
        assert_eq!(config.general.log_filter, "animecollect=info");
    }

    #[test]
    fn test_timeout_is_clamped() {
        let mut catalog = CatalogConfig::default();
        catalog.timeout_secs = 0;
        assert_eq!(catalog.timeout(), Duration::from_secs(1));
        catalog.timeout_secs = 600;
        assert_eq!(catalog.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_database_path_override() {
        let config =
            AppConfig::from_toml("[storage]\ndatabase_path = \"/tmp/x/collection.db\"\n").unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/tmp/x/collection.db"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml("[catalog\n").unwrap_err();
        assert!(matches!(err, CollectError::Config(_)));
    }

    #[test]
    fn test_roundtrip() {
        let config = AppConfig::default();
        let serialized = config.to_toml().unwrap();
        let deserialized = AppConfig::from_toml(&serialized).unwrap();
        assert_eq!(deserialized.catalog.timeout_secs, config.catalog.timeout_secs);
    }

    #[test]
    fn test_save_to_creates_parent_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.catalog.offline_demo = true;
        config.storage.database_path = Some(PathBuf::from("/tmp/collection.db"));
        config.save_to(&path).unwrap();

        let reloaded = AppConfig::from_toml(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(reloaded.catalog.offline_demo);
        assert_eq!(reloaded.db_path(), PathBuf::from("/tmp/collection.db"));
    }
}
