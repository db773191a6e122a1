//! Domain layer with core image types, error definitions and ports.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Pure image operations.
pub mod services;

pub use entities::{CacheKey, ImageLoadRequest, ImageSource, LoadedImage, TargetId, Transform};
pub use errors::{LoadError, LoadResult};
pub use ports::{ImageCachePort, ImageFetcherPort, ImageRequest};
