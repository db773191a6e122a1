//! Port definition for in-memory image caching.

use std::sync::Arc;

use crate::domain::entities::CacheKey;

/// Port for the memory tier.
///
/// Methods take `&mut self`: the loader serializes every access through the
/// same lock that guards its pending-request registry.
pub trait ImageCachePort: Send {
    /// Returns the image for `key`, promoting it to most recently used.
    fn get(&mut self, key: &CacheKey) -> Option<Arc<image::DynamicImage>>;

    /// Returns the image for `key` without touching recency.
    fn peek(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>>;

    /// Stores an image, evicting least recently used entries as needed.
    fn put(&mut self, key: CacheKey, image: Arc<image::DynamicImage>);

    /// Removes an image from the cache.
    fn evict(&mut self, key: &CacheKey);

    /// Returns the current number of cached images.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all images from the cache.
    fn clear(&mut self);
}
