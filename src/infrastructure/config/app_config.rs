//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::args::CliArgs;
use crate::infrastructure::image::ImageLoaderConfig;

const APP_NAME: &str = "imgloader";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, from `config.toml` merged with CLI flags.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path. Logs go to stderr when unset.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Disk cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Where loaded images are written.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Seconds to wait for all images before giving up.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,

    /// Image loader tuning.
    #[serde(default)]
    pub loader: ImageLoaderConfig,
}

fn default_wait_secs() -> u64 {
    30
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache_dir = Some(cache_dir.clone());
        }
        if let Some(output_dir) = &args.output_dir {
            self.output_dir = Some(output_dir.clone());
        }
        if let Some(wait_secs) = args.wait_secs {
            self.wait_secs = wait_secs;
        }
        if let Some(workers) = args.workers {
            self.loader.workers = workers;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default image cache directory (~/.cache/imgloader/images/).
    #[must_use]
    pub fn default_cache_dir() -> PathBuf {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).map_or_else(
            || std::env::temp_dir().join(APP_NAME).join("cache").join("images"),
            |dirs| dirs.cache_dir().join("images"),
        )
    }

    /// Returns effective cache directory.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(Self::default_cache_dir)
    }

    /// Returns effective output directory.
    #[must_use]
    pub fn effective_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            cache_dir: None,
            output_dir: None,
            wait_secs: default_wait_secs(),
            loader: ImageLoaderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_config_with_loader_table() {
        let toml_content = r#"
            log_level = "debug"
            cache_dir = "/var/cache/imgs"

            [loader]
            workers = 8
            disk_cache_bytes = 4096
            evict_until_under_budget = true
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/imgs")));
        assert_eq!(config.loader.workers, 8);
        assert_eq!(config.loader.disk_cache_bytes, 4096);
        assert!(config.loader.evict_until_under_budget);
        // Unset loader fields keep their defaults.
        assert_eq!(config.loader.read_timeout_secs, 5);
        assert_eq!(config.wait_secs, 30);
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.loader, ImageLoaderConfig::default());
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_args_override_file_values() {
        let mut config: AppConfig = toml::from_str("log_level = \"warn\"\n[loader]\nworkers = 2\n").unwrap();
        let args = CliArgs::parse_from([
            "imgloader",
            "--log-level",
            "trace",
            "--workers",
            "7",
            "--cache-dir",
            "/tmp/c",
            "https://example.com/a.png",
        ]);

        config.merge_with_args(&args);

        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.loader.workers, 7);
        assert_eq!(config.effective_cache_dir(), PathBuf::from("/tmp/c"));
    }
}
