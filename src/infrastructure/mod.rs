//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image handling (caching, fetching, loading).
pub mod image;

pub use config::{AppConfig, CliArgs, ConfigError, LogLevel, StorageManager};
pub use image::{
    CacheStats, DiskImageCache, HttpImageFetcher, ImageLoadedEvent, ImageLoader,
    ImageLoaderConfig, MemoryImageCache,
};
