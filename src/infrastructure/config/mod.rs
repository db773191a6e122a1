//! Application configuration.

/// `config.toml` schema and defaults.
pub mod app_config;
/// Command-line arguments.
pub mod args;
/// Config file loading.
pub mod storage;

pub use app_config::{AppConfig, LogLevel};
pub use args::CliArgs;
pub use storage::{ConfigError, StorageManager};
