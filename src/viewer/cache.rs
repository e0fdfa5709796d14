//! LRU page cache for rendered surfaces

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::types::{Quality, Surface};

/// Cache key for rendered pages
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Page number (1-based)
    pub page: usize,
    /// View scale (stored as millionths for stable hashing)
    pub scale_millionths: u32,
    /// Preview or full resolution
    pub quality: Quality,
}

impl CacheKey {
    #[must_use]
    pub fn new(page: usize, scale: f32, quality: Quality) -> Self {
        Self {
            page,
            scale_millionths: (scale * 1_000_000.0) as u32,
            quality,
        }
    }
}

/// LRU cache for rendered page surfaces
pub struct PageCache {
    cache: LruCache<CacheKey, Arc<Surface>>,
}

impl PageCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Get a cached surface, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Surface>> {
        self.cache.get(key).cloned()
    }

    /// Best surface for a page at the given view scale, full resolution first
    #[must_use]
    pub fn lookup(&mut self, page: usize, scale: f32) -> Option<Arc<Surface>> {
        self.get(&CacheKey::new(page, scale, Quality::Full))
            .or_else(|| self.get(&CacheKey::new(page, scale, Quality::Preview)))
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// True if any quality of the page is cached at the given scale
    #[must_use]
    pub fn contains_page(&self, page: usize, scale: f32) -> bool {
        self.contains(&CacheKey::new(page, scale, Quality::Full))
            || self.contains(&CacheKey::new(page, scale, Quality::Preview))
    }

    /// Insert a surface into the cache, returning an Arc to it
    pub fn insert(&mut self, key: CacheKey, surface: Surface) -> Arc<Surface> {
        let arc = Arc::new(surface);
        self.cache.put(key, arc.clone());
        arc
    }

    /// Clear all cached pages
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Number of cached surfaces
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

}
