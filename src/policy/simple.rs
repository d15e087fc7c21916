//! Unbounded policy: a plain insertion-ordered map.

use indexmap::IndexMap;
use std::hash::Hash;

use super::{Evicted, Policy};
use crate::entry::Entry;

#[derive(Debug)]
pub(crate) struct SimplePolicy<K, V> {
    entries: IndexMap<K, Entry<V>>,
}

impl<K: Hash + Eq, V> SimplePolicy<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K, V> Policy<K, V> for SimplePolicy<K, V>
where
    K: Hash + Eq + Send,
    V: Send,
{
    fn get(&mut self, key: &K) -> Option<&Entry<V>> {
        self.entries.get(key)
    }

    fn peek(&self, key: &K) -> Option<&Entry<V>> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: K, entry: Entry<V>) -> Option<Evicted<K, V>> {
        self.entries.insert(key, entry);
        None
    }

    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        self.entries.shift_remove(key)
    }

    fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        None
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> Option<usize> {
        None
    }

    fn set_capacity(&mut self, _capacity: usize) {}

    fn for_each(&self, visit: &mut dyn FnMut(&K, &Entry<V>)) {
        for (key, entry) in &self.entries {
            visit(key, entry);
        }
    }

    fn drain(&mut self) -> Vec<Evicted<K, V>> {
        self.entries.drain(..).collect()
    }
}
