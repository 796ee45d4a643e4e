//! Ordered lookup index for accumulators and ethernet pairs.
//!
//! `FlowIndex` wraps a `BTreeMap` and keeps creation explicit: `get()`
//! never inserts, only `lookup_or_create()` does. Ordering
//! makes full walks deterministic, which keeps window contents stable
//! across runs.

use std::collections::btree_map::{BTreeMap, Entry};

/// Ordered map from an index key to an owned entry.
#[derive(Debug, Clone)]
pub struct FlowIndex<K, V> {
    inner: BTreeMap<K, V>,
}

impl<K: Ord, V> FlowIndex<K, V> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the entry for `key`. **This never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Returns the entry for `key`, creating it with `create` on a miss.
    ///
    /// The flag is true when the entry was created by this call.
    pub fn lookup_or_create<F>(&mut self, key: K, create: F) -> (&mut V, bool)
    where
        F: FnOnce() -> V,
    {
        match self.inner.entry(key) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(create()), true),
        }
    }

    /// Walks every entry in key order and drops those for which `pred`
    /// returns true. `pred` may mutate the entry it is handed.
    ///
    /// Returns the number of entries removed.
    pub fn remove_if<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let before = self.inner.len();
        self.inner.retain(|key, value| !pred(key, value));
        before - self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }
}

impl<K: Ord, V> Default for FlowIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for FlowIndex<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_never_creates() {
        let index: FlowIndex<u16, u32> = FlowIndex::new();
        assert!(index.get(&1).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_lookup_or_create_is_idempotent() {
        let mut index: FlowIndex<u16, u32> = FlowIndex::new();

        let (value, created) = index.lookup_or_create(0x0800, || 7);
        assert!(created);
        *value += 1;

        let (value, created) = index.lookup_or_create(0x0800, || 100);
        assert!(!created);
        assert_eq!(*value, 8);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_if_mutates_and_removes() {
        let mut index: FlowIndex<u16, u32> = (1..=5).map(|k| (k, 0)).collect();

        let removed = index.remove_if(|key, value| {
            *value = u32::from(*key) * 10;
            key % 2 == 0
        });

        assert_eq!(removed, 2);
        assert_eq!(
            index.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            vec![(1, 10), (3, 30), (5, 50)]
        );
    }

    #[test]
    fn test_iteration_is_ordered() {
        let index: FlowIndex<u16, ()> = [9, 3, 6].into_iter().map(|k| (k, ())).collect();
        assert_eq!(index.iter().map(|(k, _)| *k).collect::<Vec<_>>(), vec![3, 6, 9]);
    }
}
