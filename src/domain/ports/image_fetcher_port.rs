//! Port for downloading raw image bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::LoadError;

/// Port for fetching encoded image bytes from a URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageFetcherPort: Send + Sync {
    /// Downloads the body at `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes, LoadError>;
}
