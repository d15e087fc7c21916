//! Least-recently-used eviction.
//!
//! A key→node map over a [`List`]; the front of the list is the most
//! recently used entry and the back is the next victim.

use std::collections::HashMap;
use std::hash::Hash;

use super::list::{List, NodeId};
use super::{Evicted, Policy};
use crate::entry::Entry;

#[derive(Debug)]
pub(crate) struct LruPolicy<K, V> {
    capacity: usize,
    map: HashMap<K, NodeId>,
    order: List<(K, Entry<V>)>,
}

impl<K: Hash + Eq + Clone, V> LruPolicy<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity.min(1024) + 1),
            order: List::new(),
        }
    }
}

impl<K, V> Policy<K, V> for LruPolicy<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Send,
{
    fn get(&mut self, key: &K) -> Option<&Entry<V>> {
        let id = *self.map.get(key)?;
        self.order.move_to_front(id);
        self.order.get(id).map(|(_, entry)| entry)
    }

    fn peek(&self, key: &K) -> Option<&Entry<V>> {
        let id = *self.map.get(key)?;
        self.order.get(id).map(|(_, entry)| entry)
    }

    fn insert(&mut self, key: K, entry: Entry<V>) -> Option<Evicted<K, V>> {
        if let Some(&id) = self.map.get(&key) {
            if let Some(slot) = self.order.get_mut(id) {
                slot.1 = entry;
            }
            self.order.move_to_front(id);
            return None;
        }

        let evicted = if self.order.len() >= self.capacity {
            self.evict_one()
        } else {
            None
        };
        let id = self.order.push_front((key.clone(), entry));
        self.map.insert(key, id);
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        let id = self.map.remove(key)?;
        self.order.remove(id).map(|(_, entry)| entry)
    }

    fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        let (key, entry) = self.order.pop_back()?;
        self.map.remove(&key);
        Some((key, entry))
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    fn for_each(&self, visit: &mut dyn FnMut(&K, &Entry<V>)) {
        for (key, entry) in self.order.iter() {
            visit(key, entry);
        }
    }

    fn drain(&mut self) -> Vec<Evicted<K, V>> {
        self.map.clear();
        self.order.take_all()
    }
}
