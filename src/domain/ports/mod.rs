//! Port definitions the loader depends on.

mod image_cache_port;
mod image_fetcher_port;
mod image_request_port;

pub use image_cache_port::ImageCachePort;
pub use image_fetcher_port::ImageFetcherPort;
pub use image_request_port::{ImageRequest, check_request};

#[cfg(test)]
pub use image_fetcher_port::MockImageFetcherPort;
