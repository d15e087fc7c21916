//! Internal storage implementation for the cache.
//!
//! `Store` wraps the active eviction policy in a single mutex and layers
//! expiration, hooks and statistics on top of it. The lock is only held
//! for in-memory bookkeeping: observers and transforms always run after it
//! has been released, so they are free to call back into the cache.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::config::{CacheConfig, Hooks};
use crate::entry::Entry;
use crate::error::{CacheError, CacheResult};
use crate::policy::{self, EvictionPolicy, Evicted, Policy};
use crate::stats::CacheStats;

pub(crate) struct Store<K, V> {
    /// The resident entries and their ordering metadata.
    policy: Mutex<Box<dyn Policy<K, V>>>,

    kind: EvictionPolicy,

    default_ttl: Option<Duration>,

    clock: Arc<dyn Clock>,

    hooks: Hooks<K, V>,

    stats: Arc<CacheStats>,
}

impl<K, V> Store<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Build the store described by `config`. Loader settings are ignored
    /// here; they belong to the `Cache` handle.
    pub(crate) fn new(config: CacheConfig<K, V>) -> Self {
        let CacheConfig {
            policy: kind,
            max_capacity,
            default_ttl,
            clock,
            hooks,
            ..
        } = config;

        Self {
            policy: Mutex::new(policy::build(kind, max_capacity)),
            kind,
            default_ttl,
            clock,
            hooks,
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub(crate) fn kind(&self) -> EvictionPolicy {
        self.kind
    }

    pub(crate) fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    /// Look up a live value and record the access with the policy.
    ///
    /// An expired entry is removed on the spot and reported as a miss.
    pub(crate) fn get(&self, key: &K) -> CacheResult<V> {
        let now = self.clock.now();

        let (hit, expired) = {
            let mut policy = self.policy.lock();
            let state = policy.peek(key).map(|entry| entry.is_expired_at(now));
            match state {
                None => (None, None),
                Some(true) => (None, policy.remove(key)),
                Some(false) => (policy.get(key).map(|entry| entry.value.clone()), None),
            }
        };

        if let Some(value) = hit {
            self.stats.record_hit();
            return self.deserialize(key, value);
        }

        self.stats.record_miss();
        if let Some(entry) = expired {
            trace!("lazily expired entry on lookup");
            self.stats.record_expiration();
            self.notify_evicted(key, &entry.value);
        }
        Err(CacheError::KeyNotFound)
    }

    /// Live value as stored, without recording a lookup or touching the
    /// ordering. Transforms are not applied.
    pub(crate) fn peek_live(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.policy
            .lock()
            .peek(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    /// Insert or overwrite `key`.
    ///
    /// `ttl` of `None` falls back to the configured default TTL.
    pub(crate) fn set(&self, key: K, value: V, ttl: Option<Duration>) -> CacheResult<()> {
        let value = self.serialize(&key, value)?;
        let expires_at = self.deadline(ttl.or(self.default_ttl));

        let added = self
            .hooks
            .on_added
            .as_ref()
            .map(|_| (key.clone(), value.clone()));

        let evicted = self.policy.lock().insert(key, Entry::new(value, expires_at));

        if let Some((key, entry)) = evicted {
            debug!(policy = %self.kind, "evicted entry to make room");
            self.stats.record_eviction();
            self.notify_evicted(&key, &entry.value);
        }
        if let (Some(on_added), Some((key, value))) = (&self.hooks.on_added, added) {
            on_added(&key, &value);
        }
        Ok(())
    }

    /// Remove `key`. Returns `true` if it was resident.
    pub(crate) fn remove(&self, key: &K) -> bool {
        let removed = self.policy.lock().remove(key);
        match removed {
            Some(entry) => {
                self.stats.record_removal();
                self.notify_evicted(key, &entry.value);
                true
            }
            None => false,
        }
    }

    /// Resident and not expired. Leaves the ordering untouched.
    pub(crate) fn has(&self, key: &K) -> bool {
        let now = self.clock.now();
        self.policy
            .lock()
            .peek(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    pub(crate) fn keys(&self, check_expired: bool) -> Vec<K> {
        let now = self.clock.now();
        let policy = self.policy.lock();
        let mut keys = Vec::with_capacity(policy.len());
        policy.for_each(&mut |key, entry| {
            if !check_expired || !entry.is_expired_at(now) {
                keys.push(key.clone());
            }
        });
        keys
    }

    pub(crate) fn len(&self, check_expired: bool) -> usize {
        let policy = self.policy.lock();
        if !check_expired {
            return policy.len();
        }

        let now = self.clock.now();
        let mut live = 0;
        policy.for_each(&mut |_, entry| {
            if !entry.is_expired_at(now) {
                live += 1;
            }
        });
        live
    }

    /// Snapshot every resident entry, deserialized.
    pub(crate) fn get_all(&self, check_expired: bool) -> CacheResult<HashMap<K, V>> {
        let now = self.clock.now();
        let mut stored = Vec::new();
        {
            let policy = self.policy.lock();
            stored.reserve(policy.len());
            policy.for_each(&mut |key, entry| {
                if !check_expired || !entry.is_expired_at(now) {
                    stored.push((key.clone(), entry.value.clone()));
                }
            });
        }

        stored
            .into_iter()
            .map(|(key, value)| {
                let value = self.deserialize(&key, value)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Drop every entry, handing each one to the purge visitor.
    pub(crate) fn purge(&self) {
        let drained = self.policy.lock().drain();
        debug!(policy = %self.kind, entries = drained.len(), "purged cache");

        if let Some(on_purge) = &self.hooks.on_purge {
            for (key, entry) in &drained {
                on_purge(key, &entry.value);
            }
        }
    }

    /// Change the capacity, evicting from the back of the eviction order
    /// until the resident set fits.
    pub(crate) fn set_size(&self, size: usize) -> CacheResult<()> {
        if !self.kind.is_bounded() {
            return Err(CacheError::InvalidConfiguration(
                "simple cache is unbounded and cannot be resized".to_string(),
            ));
        }
        if size == 0 {
            return Err(CacheError::InvalidConfiguration(
                "cache size must be positive".to_string(),
            ));
        }

        let (previous, evicted) = {
            let mut policy = self.policy.lock();
            let previous = policy.capacity();
            policy.set_capacity(size);
            let mut evicted: Vec<Evicted<K, V>> = Vec::new();
            while policy.len() > size {
                match policy.evict_one() {
                    Some(victim) => evicted.push(victim),
                    None => break,
                }
            }
            (previous, evicted)
        };

        debug!(
            policy = %self.kind,
            ?previous,
            size,
            evicted = evicted.len(),
            "resized cache"
        );
        for (key, entry) in &evicted {
            self.stats.record_eviction();
            self.notify_evicted(key, &entry.value);
        }
        Ok(())
    }

    fn deadline(&self, ttl: Option<Duration>) -> Option<Instant> {
        // A TTL too large to represent never expires.
        ttl.and_then(|ttl| self.clock.now().checked_add(ttl))
    }

    fn serialize(&self, key: &K, value: V) -> CacheResult<V> {
        match &self.hooks.serialize {
            Some(serialize) => serialize(key, value).map_err(CacheError::serialization),
            None => Ok(value),
        }
    }

    pub(crate) fn deserialize(&self, key: &K, value: V) -> CacheResult<V> {
        match &self.hooks.deserialize {
            Some(deserialize) => deserialize(key, value).map_err(CacheError::serialization),
            None => Ok(value),
        }
    }

    fn notify_evicted(&self, key: &K, value: &V) {
        if let Some(on_evicted) = &self.hooks.on_evicted {
            on_evicted(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Config = CacheConfig<&'static str, u32>;

    fn store(config: Config) -> Store<&'static str, u32> {
        Store::new(config.build().unwrap())
    }

    #[test]
    fn test_basic_set_get() {
        let store = store(Config::new());

        store.set("key1", 1, None).unwrap();
        assert_eq!(store.get(&"key1").unwrap(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = store(Config::new());
        assert!(matches!(store.get(&"nope"), Err(CacheError::KeyNotFound)));
    }

    #[test]
    fn test_lazy_expiration_with_manual_clock() {
        let clock = ManualClock::new();
        let evicted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evicted);
        let store = store(
            Config::lru(4)
                .clock(clock.clone())
                .on_evicted(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
        );

        store.set("k", 1, Some(Duration::from_secs(10))).unwrap();

        // Expired only once the deadline is strictly in the past.
        clock.advance(Duration::from_secs(10));
        assert!(store.has(&"k"));
        clock.advance(Duration::from_millis(1));
        assert!(!store.has(&"k"));

        // Enumeration filters but does not remove.
        assert!(store.keys(true).is_empty());
        assert_eq!(store.len(false), 1);
        assert_eq!(store.len(true), 0);
        assert_eq!(evicted.load(Ordering::SeqCst), 0);

        // A direct lookup removes it and fires the observer.
        assert!(matches!(store.get(&"k"), Err(CacheError::KeyNotFound)));
        assert_eq!(store.len(false), 0);
        assert_eq!(evicted.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().expirations(), 1);
    }

    #[test]
    fn test_peek_live_leaves_stats_and_order_alone() {
        let clock = ManualClock::new();
        let store = store(Config::lru(2).clock(clock.clone()));

        store.set("a", 1, None).unwrap();
        store.set("b", 2, Some(Duration::from_secs(1))).unwrap();

        assert_eq!(store.peek_live(&"a"), Some(1));
        assert_eq!(store.peek_live(&"missing"), None);
        clock.advance(Duration::from_secs(2));
        assert_eq!(store.peek_live(&"b"), None);

        // Nothing recorded, and the expired entry is still resident.
        assert_eq!(store.stats().hits(), 0);
        assert_eq!(store.stats().misses(), 0);
        assert_eq!(store.len(false), 2);

        // "a" was not promoted, so it is still the LRU victim.
        store.set("c", 3, None).unwrap();
        let mut keys = store.keys(false);
        keys.sort();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_default_ttl_applies_and_explicit_ttl_overrides() {
        let clock = ManualClock::new();
        let store = store(
            Config::lru(4)
                .clock(clock.clone())
                .default_ttl(Duration::from_secs(5)),
        );

        store.set("default", 1, None).unwrap();
        store.set("long", 2, Some(Duration::from_secs(60))).unwrap();

        clock.advance(Duration::from_secs(6));
        assert!(store.get(&"default").is_err());
        assert_eq!(store.get(&"long").unwrap(), 2);
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let clock = ManualClock::new();
        let store = store(Config::new().clock(clock.clone()));

        store.set("k", 1, Some(Duration::MAX)).unwrap();
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert_eq!(store.get(&"k").unwrap(), 1);
    }

    #[test]
    fn test_overwrite_resets_deadline() {
        let clock = ManualClock::new();
        let store = store(Config::lfu(2).clock(clock.clone()));

        store.set("k", 1, Some(Duration::from_secs(1))).unwrap();
        store.set("k", 2, None).unwrap();
        clock.advance(Duration::from_secs(5));
        assert_eq!(store.get(&"k").unwrap(), 2);
    }

    #[test]
    fn test_remove_fires_observer_once() {
        let evicted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evicted);
        let store = store(Config::arc(4).on_evicted(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!store.remove(&"missing"));
        assert_eq!(evicted.load(Ordering::SeqCst), 0);

        store.set("k", 1, None).unwrap();
        assert!(store.remove(&"k"));
        assert!(!store.remove(&"k"));
        assert_eq!(evicted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capacity_eviction_fires_observer() {
        let victims = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&victims);
        let store = store(Config::lru(2).on_evicted(move |key, value| {
            sink.lock().push((*key, *value));
        }));

        store.set("a", 1, None).unwrap();
        store.set("b", 2, None).unwrap();
        store.set("c", 3, None).unwrap();

        assert_eq!(*victims.lock(), vec![("a", 1)]);
        assert_eq!(store.stats().evictions(), 1);
    }

    #[test]
    fn test_added_observer_sees_stored_value() {
        let added = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&added);
        let store = store(
            Config::new()
                .serialize_with(|_, value| Ok(value * 10))
                .on_added(move |key, value| sink.lock().push((*key, *value))),
        );

        store.set("a", 1, None).unwrap();
        assert_eq!(*added.lock(), vec![("a", 10)]);
    }

    #[test]
    fn test_transforms_round_trip() {
        let store = store(
            Config::new()
                .serialize_with(|_, value| Ok(value + 100))
                .deserialize_with(|_, value| Ok(value - 100)),
        );

        store.set("k", 7, None).unwrap();
        assert_eq!(store.get(&"k").unwrap(), 7);
        assert_eq!(store.get_all(false).unwrap().get("k"), Some(&7));
    }

    #[test]
    fn test_serialize_failure_leaves_cache_untouched() {
        let store = store(Config::new().serialize_with(|_, _| Err("refused".into())));

        let err = store.set("k", 1, None).unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
        assert_eq!(store.len(false), 0);
    }

    #[test]
    fn test_purge_visits_every_entry() {
        let visited = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&visited);
        let store = store(Config::lru(8).on_purge(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        for key in ["a", "b", "c"] {
            store.set(key, 0, None).unwrap();
        }
        store.purge();

        assert_eq!(visited.load(Ordering::SeqCst), 3);
        assert_eq!(store.len(false), 0);
        store.set("d", 0, None).unwrap();
        assert_eq!(store.len(false), 1);
    }

    #[test]
    fn test_set_size_shrinks_from_the_back() {
        let store = store(Config::lru(4));
        for key in ["a", "b", "c", "d"] {
            store.set(key, 0, None).unwrap();
        }
        store.get(&"a").unwrap();

        store.set_size(2).unwrap();
        let mut keys = store.keys(false);
        keys.sort();
        assert_eq!(keys, vec!["a", "d"]);
        assert_eq!(store.stats().evictions(), 2);

        // The new capacity holds for later inserts.
        store.set("e", 0, None).unwrap();
        assert_eq!(store.len(false), 2);
    }

    #[test]
    fn test_set_size_rejects_invalid_requests() {
        let simple = store(Config::new());
        assert!(matches!(
            simple.set_size(10),
            Err(CacheError::InvalidConfiguration(_))
        ));

        let lru = store(Config::lru(2));
        assert!(matches!(
            lru.set_size(0),
            Err(CacheError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_stats_tracking() {
        let store = store(Config::new());

        store.set("key1", 1, None).unwrap();
        let _ = store.get(&"key1"); // Hit
        let _ = store.get(&"nonexistent"); // Miss
        store.remove(&"key1");

        let stats = store.stats();
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.removals(), 1);
    }
}
