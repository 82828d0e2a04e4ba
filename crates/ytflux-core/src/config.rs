//! Application configuration management.
//!
//! Settings live in a JSON file under the platform config directory
//! (`~/.config/ytflux/config.json` on Linux). The playlist itself is not a
//! setting: it belongs to the state store so that it travels with the data
//! it describes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::store::DEFAULT_DATABASE_FILE;
use crate::thumbnail::{CoverFormat, DEFAULT_FETCH_TIMEOUT_SECS};

const APP_DIR_NAME: &str = "ytflux";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the state database and logs.
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    /// Directory media files are written to. Defaults to
    /// `<data_directory>/music`.
    #[serde(default)]
    pub media_directory: Option<PathBuf>,
    /// Encoding of embedded cover art.
    #[serde(default)]
    pub cover_format: CoverFormat,
    /// Thumbnail request timeout in seconds.
    #[serde(default = "default_thumbnail_timeout_secs")]
    pub thumbnail_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            media_directory: None,
            cover_format: CoverFormat::default(),
            thumbnail_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it with
    /// defaults if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, creating it with defaults if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to read config file: {e}"),
            })
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;

        info!("Loaded config from {}", path.display());
        debug!("Data directory: {}", config.data_directory.display());

        Ok(config)
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: format!("Failed to create config directory: {e}"),
                })
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to write config file: {e}"),
            })
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Resolved media directory.
    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.media_directory
            .clone()
            .unwrap_or_else(|| self.data_directory.join("music"))
    }

    /// Path of the state database.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_directory.join(DEFAULT_DATABASE_FILE)
    }

    /// Directory for rotated log files.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.data_directory.join("logs")
    }

    /// Get the path to the default config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

/// Get the default data directory.
#[must_use]
pub fn default_data_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

const fn default_thumbnail_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR_NAME)
        .join("config.json")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.data_directory.ends_with("ytflux"));
        assert_eq!(config.media_dir(), config.data_directory.join("music"));
        assert_eq!(config.cover_format, CoverFormat::Jpeg);
        assert_eq!(config.thumbnail_timeout_secs, 30);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig {
            data_directory: dir.path().join("data"),
            media_directory: Some(dir.path().join("media")),
            cover_format: CoverFormat::Png,
            thumbnail_timeout_secs: 5,
        };
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.media_dir(), dir.path().join("media"));
        assert_eq!(loaded.database_path(), dir.path().join("data").join("ytflux.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"data_directory": "/srv/ytflux"}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.data_directory, PathBuf::from("/srv/ytflux"));
        assert_eq!(config.media_dir(), PathBuf::from("/srv/ytflux/music"));
        assert_eq!(config.thumbnail_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(Error::Configuration(_))
        ));
    }
}
