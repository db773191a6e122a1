//! Loading `config.toml` from the config directory.

use super::app_config::AppConfig;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while locating, reading or writing the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No per-user config directory exists on this platform.
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    /// Reading or writing the file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The default config could not be rendered as TOML.
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    /// The file is not valid TOML for [`AppConfig`].
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

/// Resolves and loads the application's `config.toml`.
pub struct StorageManager {
    config_dir: PathBuf,
}

impl StorageManager {
    /// Uses the platform config directory for `imgloader`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConfigDirNotFound`] if the platform has none.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = AppConfig::default_config_dir().ok_or(ConfigError::ConfigDirNotFound)?;
        Ok(Self { config_dir })
    }

    /// Uses `path` as the config directory.
    #[must_use]
    pub fn with_dir(path: PathBuf) -> Self {
        Self { config_dir: path }
    }

    /// Returns the configuration directory path.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the config file, honoring an explicit override.
    #[must_use]
    pub fn config_path(&self, path_override: Option<&Path>) -> PathBuf {
        path_override.map_or_else(|| self.config_dir.join(CONFIG_FILE_NAME), Path::to_path_buf)
    }

    /// Loads the application configuration.
    ///
    /// A missing file is written out with defaults so it can be edited. A
    /// file that does not parse is left untouched and defaults are used.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, or a missing file
    /// cannot be created.
    pub fn load_config(&self, path_override: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let path = self.config_path(path_override);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, writing defaults");
                let config = AppConfig::default();
                write_default(&path, &config)?;
                return Ok(config);
            }
            Err(e) => return Err(e.into()),
        };

        match toml::from_str::<AppConfig>(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded config");
                Ok(config)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                Ok(AppConfig::default())
            }
        }
    }
}

/// Writes `config` to `path` through a temp file in the same directory.
fn write_default(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
