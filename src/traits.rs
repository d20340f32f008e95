//! Shared trait abstractions for common patterns
//!
//! These traits sit at the seams between the composition engine's
//! components: viewport-driven refresh and caching.

use crate::core::viewport::ViewportWindow;

/// Trait for viewport-aware components
/// Standardizes handling of "viewport settled" notifications
pub trait ViewportAware {
    /// Handle a settled viewport. Returns `true` when the component changed
    /// what it would draw.
    fn on_viewport_settled(&mut self, viewport: &ViewportWindow) -> bool;

    /// Check if component requires viewport updates
    fn requires_viewport_updates(&self) -> bool {
        true
    }
}

/// Trait for cacheable operations
pub trait Cacheable {
    type Key: Clone + Eq + std::hash::Hash;
    type Value: Clone;

    /// Get cached value
    fn get_cached(&self, key: &Self::Key) -> Option<Self::Value>;

    /// Cache a value
    fn cache(&self, key: Self::Key, value: Self::Value);

    /// Invalidate cache entry
    fn invalidate(&self, key: &Self::Key);

    /// Clear entire cache
    fn clear_cache(&self);

    /// Get cache statistics
    fn cache_stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            size: 2,
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
