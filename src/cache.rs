//! Pluggable blob cache used to persist token lists between runs.

use std::sync::Arc;

use dashmap::DashMap;

/// Category name under which token lists are stored.
pub const TOKENS_CATEGORY: &str = "tokens";

/// One named partition of a cache.
pub trait CacheHandle: Send + Sync {
    /// Previously stored blob for `key`, if any.
    fn restore(&self, key: &str) -> Option<Vec<u8>>;

    fn store(&self, key: &str, blob: Vec<u8>);
}

pub trait CacheDriver: Send + Sync {
    fn category(&self, name: &str) -> Arc<dyn CacheHandle>;
}

/// In-process cache driver.
#[derive(Default)]
pub struct MemoryCache {
    categories: DashMap<String, Arc<MemoryHandle>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheDriver for MemoryCache {
    fn category(&self, name: &str) -> Arc<dyn CacheHandle> {
        let handle = self.categories.entry(name.to_string()).or_default();
        Arc::clone(handle.value()) as Arc<dyn CacheHandle>
    }
}

#[derive(Default)]
pub struct MemoryHandle {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryHandle {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheHandle for MemoryHandle {
    fn restore(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|blob| blob.value().clone())
    }

    fn store(&self, key: &str, blob: Vec<u8>) {
        self.entries.insert(key.to_string(), blob);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_isolated() {
        let cache = MemoryCache::new();
        cache.category("tokens").store("a", b"1".to_vec());
        assert_eq!(cache.category("tokens").restore("a"), Some(b"1".to_vec()));
        assert_eq!(cache.category("other").restore("a"), None);
    }
}
