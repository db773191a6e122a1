//! In-memory LRU image cache implementation.

use std::sync::Arc;

use lru::LruCache;
use tracing::{debug, trace};

use crate::domain::entities::CacheKey;
use crate::domain::ports::ImageCachePort;

/// Default memory budget for decoded pixels, in bytes.
pub const DEFAULT_MEMORY_CACHE_BYTES: usize = 16 * 1024 * 1024;

/// In-memory LRU cache for decoded images, bounded by decoded byte size.
///
/// Not internally synchronized; the loader keeps it behind its state lock.
pub struct MemoryImageCache {
    cache: LruCache<CacheKey, Arc<image::DynamicImage>>,
    max_bytes: usize,
    current_bytes: usize,
    hits: u64,
    misses: u64,
}

impl MemoryImageCache {
    /// Creates a new cache holding at most `max_bytes` of decoded pixels.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            cache: LruCache::unbounded(),
            max_bytes,
            current_bytes: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Creates a new cache with the default budget.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_BYTES)
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 {
            (self.hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            entries: self.cache.len(),
            bytes: self.current_bytes,
        }
    }

    /// Bytes of decoded pixels currently held.
    #[must_use]
    pub const fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    /// Configured budget in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

/// Weight of an image in the memory budget.
fn image_weight(image: &image::DynamicImage) -> usize {
    image.as_bytes().len()
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub entries: usize,
    /// Decoded bytes currently held.
    pub bytes: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({} bytes), {:.1}% hit rate ({} hits, {} misses)",
            self.entries, self.bytes, self.hit_rate, self.hits, self.misses
        )
    }
}

impl ImageCachePort for MemoryImageCache {
    fn get(&mut self, key: &CacheKey) -> Option<Arc<image::DynamicImage>> {
        if let Some(img) = self.cache.get(key) {
            self.hits += 1;
            trace!(key = %key, "Memory cache hit");
            Some(img.clone())
        } else {
            self.misses += 1;
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    fn peek(&self, key: &CacheKey) -> Option<Arc<image::DynamicImage>> {
        self.cache.peek(key).cloned()
    }

    fn put(&mut self, key: CacheKey, image: Arc<image::DynamicImage>) {
        let weight = image_weight(&image);
        if weight > self.max_bytes {
            debug!(key = %key, weight, max = self.max_bytes, "Image exceeds memory budget, not cached");
            self.evict(&key);
            return;
        }

        if let Some(old) = self.cache.put(key.clone(), image) {
            self.current_bytes -= image_weight(&old);
        }
        self.current_bytes += weight;

        while self.current_bytes > self.max_bytes {
            let Some((evicted, img)) = self.cache.pop_lru() else {
                break;
            };
            self.current_bytes -= image_weight(&img);
            trace!(key = %evicted, "Evicted least recently used image");
        }
        debug!(key = %key, weight, total = self.current_bytes, "Stored image in memory cache");
    }

    fn evict(&mut self, key: &CacheKey) {
        if let Some(img) = self.cache.pop(key) {
            self.current_bytes -= image_weight(&img);
            debug!(key = %key, "Evicted image from memory cache");
        }
    }

    fn len(&self) -> usize {
        self.cache.len()
    }

    fn clear(&mut self) {
        self.cache.clear();
        self.current_bytes = 0;
        debug!("Cleared memory image cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RGB8 image weighing `side * side * 3` bytes.
    fn rgb(side: u32) -> Arc<image::DynamicImage> {
        Arc::new(image::DynamicImage::new_rgb8(side, side))
    }

    #[test]
    fn test_cache_put_and_get() {
        let mut cache = MemoryImageCache::new(1024 * 1024);
        let key = CacheKey::new("test1");

        cache.put(key.clone(), rgb(100));
        let retrieved = cache.get(&key);

        assert_eq!(retrieved.map(|img| img.width()), Some(100));
    }

    #[test]
    fn test_cache_miss() {
        let mut cache = MemoryImageCache::new(1024);
        assert!(cache.get(&CacheKey::new("nonexistent")).is_none());
    }

    #[test]
    fn test_cache_eviction_by_bytes() {
        // 10x10 RGB = 300 bytes, two fit in 600.
        let mut cache = MemoryImageCache::new(600);

        let k1 = CacheKey::new("test1");
        let k2 = CacheKey::new("test2");
        let k3 = CacheKey::new("test3");

        cache.put(k1.clone(), rgb(10));
        cache.put(k2.clone(), rgb(10));
        cache.put(k3.clone(), rgb(10));

        // k1 should be evicted (LRU)
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k2).is_some());
        assert!(cache.get(&k3).is_some());
        assert_eq!(cache.current_bytes(), 600);
    }

    #[test]
    fn test_get_promotes() {
        let mut cache = MemoryImageCache::new(600);
        let k1 = CacheKey::new("test1");
        let k2 = CacheKey::new("test2");

        cache.put(k1.clone(), rgb(10));
        cache.put(k2.clone(), rgb(10));
        let _ = cache.get(&k1);
        cache.put(CacheKey::new("test3"), rgb(10));

        assert!(cache.peek(&k1).is_some());
        assert!(cache.peek(&k2).is_none());
    }

    #[test]
    fn test_peek_does_not_promote() {
        let mut cache = MemoryImageCache::new(600);
        let k1 = CacheKey::new("test1");

        cache.put(k1.clone(), rgb(10));
        cache.put(CacheKey::new("test2"), rgb(10));

        let _ = cache.peek(&k1);
        cache.put(CacheKey::new("test3"), rgb(10));

        assert!(cache.peek(&k1).is_none());
    }

    #[test]
    fn test_oversized_image_not_cached() {
        let mut cache = MemoryImageCache::new(100);
        let key = CacheKey::new("huge");

        cache.put(key.clone(), rgb(10));

        assert!(cache.peek(&key).is_none());
        assert_eq!(cache.current_bytes(), 0);
    }

    #[test]
    fn test_replace_adjusts_weight() {
        let mut cache = MemoryImageCache::new(10_000);
        let key = CacheKey::new("same");

        cache.put(key.clone(), rgb(10));
        cache.put(key.clone(), rgb(20));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_bytes(), 20 * 20 * 3);
    }

    #[test]
    fn test_cache_stats() {
        let mut cache = MemoryImageCache::new(10_000);
        let key = CacheKey::new("test1");

        cache.put(key.clone(), rgb(10));
        let _ = cache.get(&key);
        let _ = cache.get(&CacheKey::new("missing"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.bytes, 300);
    }

    #[test]
    fn test_clear() {
        let mut cache = MemoryImageCache::new(10_000);
        cache.put(CacheKey::new("a"), rgb(10));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.current_bytes(), 0);
    }
}
