// SPDX-License-Identifier: MIT OR Apache-2.0
//! Versioned memoization.
//!
//! A [`Cache`] entry is recomputed only when asked for a strictly newer
//! version, so a slow recomputation that finishes after a newer one can never
//! overwrite it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

struct CacheEntry<V> {
    version: u64,
    value: V,
}

/// Values memoized per key together with the version they were computed at
pub struct Cache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash, V: Clone> Cache<K, V> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Last computed value for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).map(|entry| entry.value.clone())
    }

    /// Version at which `key` was last computed
    pub fn version(&self, key: &K) -> Option<u64> {
        self.entries.read().get(key).map(|entry| entry.version)
    }

    /// Compute and store a value for `key` at `version`.
    ///
    /// `produce` only runs when `version` is strictly greater than the stored
    /// one; otherwise nothing happens and `false` is returned.
    pub fn set(&self, key: K, produce: impl FnOnce() -> V, version: u64) -> bool {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(&key) {
            if version <= entry.version {
                return false;
            }
        }
        let value = produce();
        entries.insert(key, CacheEntry { version, value });
        true
    }

    /// Return the value for `key` at `version`, computing it if the stored
    /// value is older
    pub fn get_or_update(&self, key: K, produce: impl FnOnce() -> V, version: u64) -> V
    where
        K: Clone,
    {
        if let Some(entry) = self.entries.read().get(&key) {
            if entry.version >= version {
                return entry.value.clone();
            }
        }
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(entry) if entry.version >= version => entry.value.clone(),
            _ => {
                let value = produce();
                entries.insert(
                    key,
                    CacheEntry {
                        version,
                        value: value.clone(),
                    },
                );
                value
            }
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<K: Eq + Hash, V: Clone> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

/// Monotonic version shared between a graph and the handles it owns
#[derive(Debug, Default)]
pub struct VersionCounter(AtomicU64);

impl VersionCounter {
    /// Start counting from `initial`
    pub fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    /// Current version
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Advance by one and return the new version
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_set_requires_newer_version() {
        let cache: Cache<&str, u32> = Cache::new();
        assert!(cache.get(&"nodes").is_none());

        assert!(cache.set("nodes", || 1, 1));
        assert_eq!(cache.get(&"nodes"), Some(1));

        let calls = Cell::new(0);
        let stale = cache.set(
            "nodes",
            || {
                calls.set(calls.get() + 1);
                2
            },
            1,
        );
        assert!(!stale);
        let older = cache.set(
            "nodes",
            || {
                calls.set(calls.get() + 1);
                3
            },
            0,
        );
        assert!(!older);
        assert_eq!(calls.get(), 0);
        assert_eq!(cache.get(&"nodes"), Some(1));

        assert!(cache.set("nodes", || 4, 5));
        assert_eq!(cache.get(&"nodes"), Some(4));
        assert_eq!(cache.version(&"nodes"), Some(5));
    }

    #[test]
    fn test_get_or_update_reuses_value() {
        let cache: Cache<&str, u32> = Cache::new();
        let calls = Cell::new(0);
        let produce = || {
            calls.set(calls.get() + 1);
            calls.get()
        };
        assert_eq!(cache.get_or_update("edges", produce, 3), 1);
        assert_eq!(cache.get_or_update("edges", produce, 3), 1);
        assert_eq!(cache.get_or_update("edges", produce, 4), 2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_version_counter() {
        let counter = VersionCounter::new(3);
        assert_eq!(counter.bump(), 4);
        assert_eq!(counter.current(), 4);
    }
}
