//! Eviction policies.
//!
//! Each policy owns the resident entries and decides which one goes when
//! the cache is full. The [`Store`](crate::storage::Store) keeps the active
//! policy behind a single mutex, so nothing here needs to be thread-safe
//! beyond being `Send`.

mod arc;
mod lfu;
pub(crate) mod list;
mod lru;
mod simple;

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::entry::Entry;
use crate::error::CacheError;

pub(crate) use arc::ArcPolicy;
pub(crate) use lfu::LfuPolicy;
pub(crate) use lru::LruPolicy;
pub(crate) use simple::SimplePolicy;

/// Which eviction algorithm a cache uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvictionPolicy {
    /// Unbounded; never evicts.
    #[default]
    Simple,
    /// Least Recently Used.
    Lru,
    /// Least Frequently Used, oldest first within a frequency.
    Lfu,
    /// Adaptive Replacement Cache.
    Arc,
}

impl EvictionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Simple => "simple",
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Arc => "arc",
        }
    }

    /// Whether the policy enforces a capacity.
    pub fn is_bounded(&self) -> bool {
        !matches!(self, EvictionPolicy::Simple)
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(EvictionPolicy::Simple),
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "arc" => Ok(EvictionPolicy::Arc),
            _ => Err(CacheError::InvalidConfiguration(format!(
                "unknown eviction policy '{s}'"
            ))),
        }
    }
}

/// A key and the entry that was pushed out for it.
pub(crate) type Evicted<K, V> = (K, Entry<V>);

/// The resident-set bookkeeping every policy provides.
pub(crate) trait Policy<K, V>: Send {
    /// Look up and record an access.
    fn get(&mut self, key: &K) -> Option<&Entry<V>>;

    /// Look up without touching the ordering.
    fn peek(&self, key: &K) -> Option<&Entry<V>>;

    /// Insert or overwrite. Returns the resident entry evicted to make room.
    fn insert(&mut self, key: K, entry: Entry<V>) -> Option<Evicted<K, V>>;

    fn remove(&mut self, key: &K) -> Option<Entry<V>>;

    /// Evict whatever sits at the back of the eviction order.
    fn evict_one(&mut self) -> Option<Evicted<K, V>>;

    /// Number of resident entries.
    fn len(&self) -> usize;

    /// `None` for unbounded policies.
    fn capacity(&self) -> Option<usize>;

    /// Change the capacity. The caller evicts any excess.
    fn set_capacity(&mut self, capacity: usize);

    fn for_each(&self, visit: &mut dyn FnMut(&K, &Entry<V>));

    /// Take every resident entry and reset to empty.
    fn drain(&mut self) -> Vec<Evicted<K, V>>;
}

/// Instantiate the policy structure for `kind`.
pub(crate) fn build<K, V>(kind: EvictionPolicy, capacity: usize) -> Box<dyn Policy<K, V>>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    match kind {
        EvictionPolicy::Simple => Box::new(SimplePolicy::new()),
        EvictionPolicy::Lru => Box::new(LruPolicy::new(capacity)),
        EvictionPolicy::Lfu => Box::new(LfuPolicy::new(capacity)),
        EvictionPolicy::Arc => Box::new(ArcPolicy::new(capacity)),
    }
}
