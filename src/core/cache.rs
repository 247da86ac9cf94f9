//! Resource Cache
//!
//! Explicit replacement for process-wide lookup tables: values are loaded on
//! first use, shared behind `Arc`, and live as long as the cache itself.
//! There is no eviction.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

/// Populate-on-first-use cache.
pub struct ResourceCache<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> ResourceCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get a cached value without loading.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    /// Get the value for `key`, running `load` only if it is not cached yet.
    ///
    /// A failed load leaves the cache unchanged so a later call can retry.
    pub fn get_or_load<E, F>(&self, key: &K, load: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = Arc::new(load(key)?);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have loaded the same key meanwhile; keep the first.
        let stored = entries.entry(key.clone()).or_insert(value);
        Ok(Arc::clone(stored))
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if nothing has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for ResourceCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
