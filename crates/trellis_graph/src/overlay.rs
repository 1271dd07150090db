// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sparse copy-on-write layers over immutable storage.
//!
//! An overlay entry shadows the base value for one key; keys without an
//! entry fall through to the base. Immutable tables key by row [`Handle`];
//! sources whose rows can be replaced key by entity id.

use crate::entity::PropertyMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Opaque row key used by tabular and columnar sources
pub type Handle = usize;

/// Per-key override values
#[derive(Debug)]
pub struct Overlay<T, K = Handle> {
    values: RwLock<HashMap<K, T>>,
}

impl<T: Clone, K: Eq + Hash> Overlay<T, K> {
    /// Create an empty overlay
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Override for `key`, if any
    pub fn get(&self, key: &K) -> Option<T> {
        self.values.read().get(key).cloned()
    }

    /// Override value, else `base()`
    pub fn get_or(&self, key: &K, base: impl FnOnce() -> T) -> T {
        self.get(key).unwrap_or_else(base)
    }

    /// Record an override
    pub fn set(&self, key: K, value: T) {
        self.values.write().insert(key, value);
    }

    /// Drop the override for `key`
    pub fn reset(&self, key: &K) -> Option<T> {
        self.values.write().remove(key)
    }

    /// Whether `key` is overridden
    pub fn contains(&self, key: &K) -> bool {
        self.values.read().contains_key(key)
    }

    /// Number of overridden keys
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether nothing is overridden
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every override
    pub fn clear(&self) {
        self.values.write().clear();
    }
}

impl<T: Clone, K: Eq + Hash> Default for Overlay<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Property overrides per key.
///
/// `set_property` shadows single properties; `replace` hides the whole base bag.
#[derive(Debug)]
pub struct PropertyOverlay<K = Handle> {
    props: Overlay<PropertyMap, K>,
    replaced: RwLock<HashSet<K>>,
}

impl<K: Eq + Hash + Clone> PropertyOverlay<K> {
    /// Create an empty overlay
    pub fn new() -> Self {
        Self {
            props: Overlay::new(),
            replaced: RwLock::new(HashSet::new()),
        }
    }

    /// Shadow one property
    pub fn set_property(&self, key: &K, name: &str, value: Value) {
        let mut props = self.props.get(key).unwrap_or_default();
        props.insert(name.to_string(), value);
        self.props.set(key.clone(), props);
    }

    /// Replace the whole bag
    pub fn replace(&self, key: &K, data: PropertyMap) {
        self.props.set(key.clone(), data);
        self.replaced.write().insert(key.clone());
    }

    /// Look `name` up in the overlay, then in `base`
    pub fn property(
        &self,
        key: &K,
        name: &str,
        base: impl FnOnce() -> Option<Value>,
    ) -> Option<Value> {
        if let Some(value) = self.props.get(key).and_then(|props| props.get(name).cloned()) {
            return Some(value);
        }
        if self.replaced.read().contains(key) {
            return None;
        }
        base()
    }

    /// Full bag: `base` with the overrides applied
    pub fn data(&self, key: &K, base: impl FnOnce() -> PropertyMap) -> PropertyMap {
        let overrides = self.props.get(key);
        if self.replaced.read().contains(key) {
            return overrides.unwrap_or_default();
        }
        let mut data = base();
        if let Some(overrides) = overrides {
            data.extend(overrides);
        }
        data
    }

    /// Whether `key` has any override
    pub fn contains(&self, key: &K) -> bool {
        self.props.contains(key)
    }

    /// Drop every override
    pub fn clear(&self) {
        self.props.clear();
        self.replaced.write().clear();
    }
}

impl<K: Eq + Hash + Clone> Default for PropertyOverlay<K> {
    fn default() -> Self {
        Self::new()
    }
}
