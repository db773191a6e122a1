//! Domain types for image handling.

use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Stable lookup key shared by the memory and disk cache tiers.
///
/// Derived from the image URL plus a signature of the post-processing
/// applied to it, since both tiers hold the post-processed image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a `CacheKey` from an already derived string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives a key by hashing the URL and the post-processing variant.
    #[must_use]
    pub fn derive(url: &str, variant: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        // Separator keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update([0u8]);
        hasher.update(variant.as_bytes());
        let result = hasher.finalize();
        Self(hex::encode(&result[..16]))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the display slot a request is loading into.
///
/// At most one request per target is ever honored: a newer request for the
/// same target silently supersedes any older one still in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId(String);

impl TargetId {
    /// Creates a new `TargetId` from any string-like input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded from in-memory LRU cache.
    MemoryCache,
    /// Loaded from disk cache.
    DiskCache,
    /// Downloaded from network.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A decoded, post-processed image ready for display.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Cache key the image is stored under.
    pub key: CacheKey,
    /// The decoded image, shared with the memory cache.
    pub image: Arc<image::DynamicImage>,
    /// Tier that produced the image.
    pub source: ImageSource,
}

impl LoadedImage {
    /// Width of the decoded image in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height of the decoded image in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_cache_key_length() {
        let key = CacheKey::derive("https://example.com/avatar.png", "");
        assert_eq!(key.as_str().len(), 32);
    }

    #[test]
    fn test_cache_key_consistency() {
        let url = "https://example.com/image.png";
        assert_eq!(
            CacheKey::derive(url, "resize=64x64"),
            CacheKey::derive(url, "resize=64x64")
        );
    }

    #[test_case("https://example.com/a.png", "", "https://example.com/b.png", "" ; "different urls")]
    #[test_case("https://example.com/a.png", "resize=64x64", "https://example.com/a.png", "resize=32x32" ; "different resize")]
    #[test_case("https://example.com/a.png", "circle", "https://example.com/a.png", "" ; "transform vs none")]
    #[test_case("ab", "c", "a", "bc" ; "shifted boundary")]
    fn test_cache_key_distinct(url_a: &str, var_a: &str, url_b: &str, var_b: &str) {
        assert_ne!(CacheKey::derive(url_a, var_a), CacheKey::derive(url_b, var_b));
    }

    #[test]
    fn test_image_source_display() {
        assert_eq!(ImageSource::MemoryCache.to_string(), "memory");
        assert_eq!(ImageSource::DiskCache.to_string(), "disk");
        assert_eq!(ImageSource::Network.to_string(), "network");
    }
}
