//! Least-frequently-used eviction.
//!
//! Keys are grouped into frequency buckets kept in ascending order. Each
//! bucket is a [`List`] with the newest arrival at the front, so the victim
//! is the back of the lowest bucket: least used, oldest among equals.
//!
//! ```text
//!   freq=1: [e] ◄──► [d]        ◄── victim (d)
//!   freq=3: [a]
//!   freq=4: [c] ◄──► [b]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::list::{List, NodeId};
use super::{Evicted, Policy};
use crate::entry::Entry;

#[derive(Debug)]
struct Slot<V> {
    freq: u64,
    node: NodeId,
    entry: Entry<V>,
}

#[derive(Debug)]
pub(crate) struct LfuPolicy<K, V> {
    capacity: usize,
    map: HashMap<K, Slot<V>>,
    buckets: BTreeMap<u64, List<K>>,
}

impl<K: Hash + Eq + Clone, V> LfuPolicy<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity.min(1024) + 1),
            buckets: BTreeMap::new(),
        }
    }

    /// Unlink `node` from its bucket, dropping the bucket once empty.
    fn unlink(buckets: &mut BTreeMap<u64, List<K>>, freq: u64, node: NodeId) {
        if let Some(bucket) = buckets.get_mut(&freq) {
            bucket.remove(node);
            if bucket.is_empty() {
                buckets.remove(&freq);
            }
        }
    }
}

impl<K, V> Policy<K, V> for LfuPolicy<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Send,
{
    fn get(&mut self, key: &K) -> Option<&Entry<V>> {
        let slot = self.map.get_mut(key)?;

        Self::unlink(&mut self.buckets, slot.freq, slot.node);
        slot.freq = slot.freq.saturating_add(1);
        slot.node = self
            .buckets
            .entry(slot.freq)
            .or_default()
            .push_front(key.clone());

        Some(&slot.entry)
    }

    fn peek(&self, key: &K) -> Option<&Entry<V>> {
        self.map.get(key).map(|slot| &slot.entry)
    }

    fn insert(&mut self, key: K, entry: Entry<V>) -> Option<Evicted<K, V>> {
        if let Some(slot) = self.map.get_mut(&key) {
            slot.entry = entry;
            return None;
        }

        let evicted = if self.map.len() >= self.capacity {
            self.evict_one()
        } else {
            None
        };
        let node = self.buckets.entry(1).or_default().push_front(key.clone());
        self.map.insert(
            key,
            Slot {
                freq: 1,
                node,
                entry,
            },
        );
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        let slot = self.map.remove(key)?;
        Self::unlink(&mut self.buckets, slot.freq, slot.node);
        Some(slot.entry)
    }

    fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        let mut lowest = self.buckets.first_entry()?;
        let key = lowest.get_mut().pop_back()?;
        if lowest.get().is_empty() {
            lowest.remove();
        }

        let slot = self.map.remove(&key)?;
        Some((key, slot.entry))
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
        for (key, slot) in &self.map {
            visit(key, &slot.entry);
        }
    }

    fn drain(&mut self) -> Vec<Evicted<K, V>> {
        self.buckets.clear();
        self.map
            .drain()
            .map(|(key, slot)| (key, slot.entry))
            .collect()
    }
}
