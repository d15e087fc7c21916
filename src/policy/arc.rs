//! Adaptive Replacement Cache.
//!
//! Four lists share one key index:
//!
//! ```text
//!   B1 (ghosts) ◄── T1 (seen once) │ T2 (seen again) ──► B2 (ghosts)
//!                            ◄──── p ────►
//! ```
//!
//! T1 and T2 hold resident entries; B1 and B2 remember only the keys that
//! were recently pushed out of them. A set that hits a B1 ghost means T1
//! was too small, so the target size `p` of T1 grows; a B2 ghost hit shrinks
//! it. REPLACE then evicts from whichever resident list is over its share.
//!
//! Invariants: `|T1| + |T2| <= c`, `|T1| + |B1| <= c`, `|T2| + |B2| <= 2c`,
//! `0 <= p <= c`, and every key sits in at most one list.

use std::collections::HashMap;
use std::hash::Hash;

use super::list::{List, NodeId};
use super::{Evicted, Policy};
use crate::entry::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    T1(NodeId),
    T2(NodeId),
    B1(NodeId),
    B2(NodeId),
}

#[derive(Debug)]
pub(crate) struct ArcPolicy<K, V> {
    capacity: usize,
    /// Target size of T1.
    p: usize,
    t1: List<(K, Entry<V>)>,
    t2: List<(K, Entry<V>)>,
    b1: List<K>,
    b2: List<K>,
    index: HashMap<K, Location>,
}

impl<K: Hash + Eq + Clone, V> ArcPolicy<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            p: 0,
            t1: List::new(),
            t2: List::new(),
            b1: List::new(),
            b2: List::new(),
            index: HashMap::new(),
        }
    }

    fn resident(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    /// Push the victim chosen by the adaptation target into its ghost list.
    fn replace(&mut self, from_b2: bool) -> Option<Evicted<K, V>> {
        let t1 = self.t1.len();
        let take_t1 =
            (t1 >= 1 && (t1 > self.p || (from_b2 && t1 == self.p))) || self.t2.is_empty();

        let (key, entry) = if take_t1 {
            self.t1.pop_back()?
        } else {
            self.t2.pop_back()?
        };
        let ghost = if take_t1 {
            Location::B1(self.b1.push_front(key.clone()))
        } else {
            Location::B2(self.b2.push_front(key.clone()))
        };
        self.index.insert(key.clone(), ghost);
        Some((key, entry))
    }

    /// Make room for a resident entry only when the resident set is full.
    fn replace_if_full(&mut self, from_b2: bool) -> Option<Evicted<K, V>> {
        if self.resident() >= self.capacity {
            self.replace(from_b2)
        } else {
            None
        }
    }

    fn drop_b1_lru(&mut self) {
        if let Some(key) = self.b1.pop_back() {
            self.index.remove(&key);
        }
    }

    fn drop_b2_lru(&mut self) {
        if let Some(key) = self.b2.pop_back() {
            self.index.remove(&key);
        }
    }

    /// Drop the oldest ghosts until the size invariants hold again.
    fn trim_ghosts(&mut self) {
        while !self.b1.is_empty() && self.t1.len() + self.b1.len() > self.capacity {
            self.drop_b1_lru();
        }
        while self.b2.len() > self.capacity {
            self.drop_b2_lru();
        }
    }

    fn push_t2(&mut self, key: K, entry: Entry<V>) {
        let node = self.t2.push_front((key.clone(), entry));
        self.index.insert(key, Location::T2(node));
    }

    fn insert_miss(&mut self, key: K, entry: Entry<V>) -> Option<Evicted<K, V>> {
        let c = self.capacity;
        let mut evicted = None;

        if self.t1.len() + self.b1.len() >= c {
            if self.t1.len() < c {
                self.drop_b1_lru();
                evicted = self.replace_if_full(false);
            } else if let Some((old, old_entry)) = self.t1.pop_back() {
                // T1 alone fills the cache; its LRU leaves without a ghost.
                self.index.remove(&old);
                evicted = Some((old, old_entry));
            }
        } else {
            let total = self.resident() + self.b1.len() + self.b2.len();
            if total >= c {
                if total >= 2 * c {
                    self.drop_b2_lru();
                }
                evicted = self.replace_if_full(false);
            }
        }

        let node = self.t1.push_front((key.clone(), entry));
        self.index.insert(key, Location::T1(node));
        evicted
    }
}

impl<K, V> Policy<K, V> for ArcPolicy<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Send,
{
    fn get(&mut self, key: &K) -> Option<&Entry<V>> {
        let node = match *self.index.get(key)? {
            Location::T1(id) => {
                let resident = self.t1.remove(id)?;
                let node = self.t2.push_front(resident);
                if let Some(location) = self.index.get_mut(key) {
                    *location = Location::T2(node);
                }
                node
            }
            Location::T2(id) => {
                self.t2.move_to_front(id);
                id
            }
            Location::B1(_) | Location::B2(_) => return None,
        };
        self.t2.get(node).map(|(_, entry)| entry)
    }

    fn peek(&self, key: &K) -> Option<&Entry<V>> {
        match *self.index.get(key)? {
            Location::T1(id) => self.t1.get(id).map(|(_, entry)| entry),
            Location::T2(id) => self.t2.get(id).map(|(_, entry)| entry),
            Location::B1(_) | Location::B2(_) => None,
        }
    }

    fn insert(&mut self, key: K, entry: Entry<V>) -> Option<Evicted<K, V>> {
        let location = self.index.get(&key).copied();
        let evicted = match location {
            Some(Location::T1(id)) => {
                self.t1.remove(id);
                self.push_t2(key, entry);
                None
            }
            Some(Location::T2(id)) => {
                if let Some(slot) = self.t2.get_mut(id) {
                    slot.1 = entry;
                }
                self.t2.move_to_front(id);
                None
            }
            Some(Location::B1(id)) => {
                let delta = (self.b2.len() / self.b1.len()).max(1);
                self.p = (self.p + delta).min(self.capacity);
                self.b1.remove(id);
                self.index.remove(&key);

                let evicted = self.replace_if_full(false);
                self.push_t2(key, entry);
                evicted
            }
            Some(Location::B2(id)) => {
                let delta = (self.b1.len() / self.b2.len()).max(1);
                self.p = self.p.saturating_sub(delta);
                self.b2.remove(id);
                self.index.remove(&key);

                let evicted = self.replace_if_full(true);
                self.push_t2(key, entry);
                evicted
            }
            None => self.insert_miss(key, entry),
        };
        self.trim_ghosts();
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        match self.index.remove(key)? {
            Location::T1(id) => self.t1.remove(id).map(|(_, entry)| entry),
            Location::T2(id) => self.t2.remove(id).map(|(_, entry)| entry),
            Location::B1(id) => {
                self.b1.remove(id);
                None
            }
            Location::B2(id) => {
                self.b2.remove(id);
                None
            }
        }
    }

    fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        let evicted = self.replace(false);
        self.trim_ghosts();
        evicted
    }

    fn len(&self) -> usize {
        self.resident()
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }

    fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.p = self.p.min(capacity);
        self.trim_ghosts();
    }

    fn for_each(&self, visit: &mut dyn FnMut(&K, &Entry<V>)) {
        for (key, entry) in self.t1.iter().chain(self.t2.iter()) {
            visit(key, entry);
        }
    }

    fn drain(&mut self) -> Vec<Evicted<K, V>> {
        let mut drained = self.t1.take_all();
        drained.extend(self.t2.take_all());
        self.b1.take_all();
        self.b2.take_all();
        self.index.clear();
        self.p = 0;
        drained
    }
}
