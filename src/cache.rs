//! The main cache interface.
//!
//! This module provides the primary `Cache` type that users interact with.
//! It wraps the internal storage and the load group, and provides a clean,
//! thread-safe API.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{CacheConfig, Loader};
use crate::error::{CacheError, CacheResult};
use crate::load_group::{Flight, LoadGroup};
use crate::policy::EvictionPolicy;
use crate::stats::{CacheStats, StatsSnapshot};
use crate::storage::Store;

/// A thread-safe, in-memory cache with pluggable eviction, TTLs and
/// deduplicated loading.
///
/// # Features
/// - **Thread-safe**: Can be shared across threads and tasks by cloning.
/// - **Eviction policies**: Simple (unbounded), LRU, LFU or ARC.
/// - **TTL support**: Entries can have an optional time-to-live, checked lazily.
/// - **Loading**: With a loader configured, concurrent misses on one key
///   share a single load.
/// - **Statistics**: Track hits, misses, evictions, and more.
///
/// # Example
/// ```
/// use policy_cache::{Cache, CacheConfig};
/// use std::time::Duration;
///
/// // An LRU cache with max 1000 entries and a 5 minute default TTL
/// let config = CacheConfig::lru(1000).default_ttl(Duration::from_secs(300));
/// let cache = Cache::new(config).unwrap();
///
/// // Basic operations
/// cache.set("user:123", "Alice").unwrap();
/// if let Ok(value) = cache.get(&"user:123") {
///     println!("Found: {}", value);
/// }
///
/// // With explicit TTL
/// cache
///     .set_with_expire("session:abc", "data", Duration::from_secs(60))
///     .unwrap();
///
/// // Check statistics
/// let stats = cache.stats();
/// println!("Hit rate: {:.1}%", stats.hit_rate);
/// ```
pub struct Cache<K, V> {
    inner: Arc<Inner<K, V>>,
}

struct Inner<K, V> {
    store: Arc<Store<K, V>>,
    loader: Option<Loader<K, V>>,
    group: LoadGroup<K, V>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration.
    ///
    /// Fails with [`CacheError::InvalidConfiguration`] if a bounded policy
    /// has no capacity.
    ///
    /// # Example
    /// ```
    /// use policy_cache::{Cache, CacheConfig, CacheError};
    ///
    /// let cache = Cache::<u64, String>::new(CacheConfig::arc(128)).unwrap();
    /// assert!(cache.is_empty());
    ///
    /// let invalid = Cache::<u64, String>::new(CacheConfig::lru(0));
    /// assert!(matches!(invalid, Err(CacheError::InvalidConfiguration(_))));
    /// ```
    pub fn new(config: CacheConfig<K, V>) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(mut config: CacheConfig<K, V>) -> Self {
        let loader = config.loader.take();
        debug!(
            policy = %config.policy,
            capacity = config.max_capacity,
            loader = loader.is_some(),
            "created cache"
        );
        let store = Store::new(config);
        Self {
            inner: Arc::new(Inner {
                store: Arc::new(store),
                loader,
                group: LoadGroup::new(),
            }),
        }
    }

    /// Get a value from the cache without loading it.
    ///
    /// Returns [`CacheError::KeyNotFound`] if the key doesn't exist or has
    /// expired; an expired entry is removed on the way. Accessing a key
    /// counts as a use for the eviction policy.
    ///
    /// # Example
    /// ```
    /// use policy_cache::{Cache, CacheConfig};
    ///
    /// let cache = Cache::new(CacheConfig::new()).unwrap();
    /// cache.set("key", 1).unwrap();
    ///
    /// match cache.get(&"key") {
    ///     Ok(value) => println!("Found: {}", value),
    ///     Err(e) => println!("Not found: {}", e),
    /// }
    /// ```
    pub fn get(&self, key: &K) -> CacheResult<V> {
        self.inner.store.get(key)
    }

    /// Get a value, loading it on a miss.
    ///
    /// Concurrent callers for the same missing key share one loader call
    /// and all receive its result. If `cancel` fires first, this caller
    /// gets [`CacheError::Cancelled`] while the load carries on and still
    /// fills the cache. Without a loader a miss is
    /// [`CacheError::KeyNotFound`].
    ///
    /// Loads run on the Tokio runtime; polled outside one, a miss fails
    /// with [`CacheError::LoaderFault`].
    ///
    /// # Example
    /// ```
    /// use policy_cache::{Cache, CacheConfig, Loaded};
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let cache = Cache::new(
    ///     CacheConfig::lru(100).loader(|id: u32| async move { Ok(Loaded::new(id * 2)) }),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(cache.get_or_load(21, None).await.unwrap(), 42);
    /// assert!(cache.has(&21));
    /// # }
    /// ```
    pub async fn get_or_load(&self, key: K, cancel: Option<&CancellationToken>) -> CacheResult<V> {
        match self.inner.store.get(&key) {
            Err(CacheError::KeyNotFound) => {}
            found => return found,
        }
        if self.inner.loader.is_none() {
            return Err(CacheError::KeyNotFound);
        }
        if Handle::try_current().is_err() {
            return Err(CacheError::LoaderFault("no tokio runtime".to_string()));
        }

        match self.load(key.clone(), true) {
            Flight::Ready(stored) => self.inner.store.deserialize(&key, stored),
            flight => flight.wait(cancel).await,
        }
    }

    /// Get a value if it is cached, never waiting on a load.
    ///
    /// On a miss this starts a background load (when a loader is configured,
    /// no load for the key is in flight and a Tokio runtime is available)
    /// and returns [`CacheError::KeyNotFound`] right away.
    pub fn get_if_present(&self, key: &K) -> CacheResult<V> {
        match self.inner.store.get(key) {
            Err(CacheError::KeyNotFound) => {}
            found => return found,
        }

        if self.inner.loader.is_some() && Handle::try_current().is_ok() {
            // The result lands in the cache; nobody waits for it here.
            match self.load(key.clone(), false) {
                Flight::Ready(stored) => return self.inner.store.deserialize(key, stored),
                Flight::Leader(_) => trace!("started background load"),
                Flight::Follower(_) | Flight::Busy => {}
            }
        }
        Err(CacheError::KeyNotFound)
    }

    /// Join or start the load for `key`. A value that landed after the
    /// caller's miss comes back as [`Flight::Ready`], still serialized.
    fn load(&self, key: K, wait: bool) -> Flight<V> {
        let Some(loader) = self.inner.loader.clone() else {
            return Flight::Busy;
        };
        let store = Arc::clone(&self.inner.store);
        let lookup = key.clone();

        let cached = || self.inner.store.peek_live(&lookup);
        let flight = self.inner.group.call(key.clone(), wait, cached, move || async move {
            debug!("loading missing key");
            match loader(key.clone()).await {
                Ok(loaded) => {
                    store.stats().record_load();
                    store.set(key, loaded.value.clone(), loaded.ttl)?;
                    debug!("load finished");
                    Ok(loaded.value)
                }
                Err(err) => {
                    store.stats().record_load_failure();
                    warn!(error = %err, "loader failed");
                    Err(CacheError::loader(err))
                }
            }
        });

        match flight {
            Flight::Ready(_) => trace!("value landed while joining"),
            Flight::Follower(_) => trace!("joined in-flight load"),
            Flight::Leader(_) | Flight::Busy => {}
        }
        flight
    }

    /// Set a value in the cache.
    ///
    /// If a `default_ttl` is configured, the entry uses that TTL.
    /// Otherwise, it will not expire.
    ///
    /// # Example
    /// ```
    /// use policy_cache::{Cache, CacheConfig};
    ///
    /// let cache = Cache::new(CacheConfig::lfu(10)).unwrap();
    /// cache.set("string_key", "string value").unwrap();
    /// ```
    pub fn set(&self, key: K, value: V) -> CacheResult<()> {
        self.inner.store.set(key, value, None)
    }

    /// Set a value in the cache with a specific TTL.
    ///
    /// The entry is treated as absent once `ttl` has passed.
    ///
    /// # Example
    /// ```
    /// use policy_cache::{Cache, CacheConfig};
    /// use std::time::Duration;
    ///
    /// let cache = Cache::new(CacheConfig::new()).unwrap();
    /// cache
    ///     .set_with_expire("session", "data", Duration::from_secs(3600))
    ///     .unwrap();
    /// ```
    pub fn set_with_expire(&self, key: K, value: V, ttl: Duration) -> CacheResult<()> {
        self.inner.store.set(key, value, Some(ttl))
    }

    /// Snapshot every entry in the cache.
    ///
    /// With `check_expired`, expired entries are left out (but not removed).
    pub fn get_all(&self, check_expired: bool) -> CacheResult<HashMap<K, V>> {
        self.inner.store.get_all(check_expired)
    }

    /// Remove a key from the cache.
    ///
    /// Returns `true` if the key existed and was removed.
    ///
    /// # Example
    /// ```
    /// use policy_cache::{Cache, CacheConfig};
    ///
    /// let cache = Cache::new(CacheConfig::new()).unwrap();
    /// cache.set("key", "value").unwrap();
    /// assert!(cache.remove(&"key"));
    /// assert!(!cache.remove(&"key")); // Already removed
    /// ```
    pub fn remove(&self, key: &K) -> bool {
        self.inner.store.remove(key)
    }

    /// Remove all entries from the cache, passing each to the purge visitor.
    pub fn purge(&self) {
        self.inner.store.purge();
    }

    /// Keys currently resident.
    pub fn keys(&self, check_expired: bool) -> Vec<K> {
        self.inner.store.keys(check_expired)
    }

    /// Number of resident entries.
    ///
    /// Without `check_expired` this may include expired entries that
    /// haven't been looked up since they expired.
    pub fn len(&self, check_expired: bool) -> usize {
        self.inner.store.len(check_expired)
    }

    /// Check if the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len(false) == 0
    }

    /// Check if a key exists and has not expired.
    ///
    /// Note: This does NOT count as a use for the eviction policy.
    ///
    /// # Example
    /// ```
    /// use policy_cache::{Cache, CacheConfig};
    ///
    /// let cache = Cache::new(CacheConfig::lru(2)).unwrap();
    /// assert!(!cache.has(&"key"));
    /// cache.set("key", "value").unwrap();
    /// assert!(cache.has(&"key"));
    /// ```
    pub fn has(&self, key: &K) -> bool {
        self.inner.store.has(key)
    }

    /// Change the capacity of a bounded cache, evicting entries from the
    /// back of the eviction order if it shrinks below the current size.
    pub fn set_size(&self, size: usize) -> CacheResult<()> {
        self.inner.store.set_size(size)
    }

    /// The eviction policy in use.
    pub fn policy(&self) -> EvictionPolicy {
        self.inner.store.kind()
    }

    /// Get a snapshot of the cache statistics.
    ///
    /// # Example
    /// ```
    /// use policy_cache::{Cache, CacheConfig};
    ///
    /// let cache = Cache::new(CacheConfig::new()).unwrap();
    /// cache.set("key", "value").unwrap();
    /// let _ = cache.get(&"key");        // Hit
    /// let _ = cache.get(&"missing");    // Miss
    ///
    /// let stats = cache.stats();
    /// assert_eq!((stats.hits, stats.misses), (1, 1));
    /// ```
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.store.stats().snapshot()
    }

    /// Get a reference to the internal statistics counters.
    ///
    /// This is useful for integrating with external metrics systems.
    pub fn stats_ref(&self) -> Arc<CacheStats> {
        Arc::clone(self.inner.store.stats())
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// An unbounded `Simple` cache.
    fn default() -> Self {
        Self::from_config(CacheConfig::default())
    }
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("policy", &self.policy())
            .field("len", &self.len(false))
            .field("loader", &self.inner.loader.is_some())
            .field("loads_in_flight", &self.inner.group.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Loaded;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loader(calls: Arc<AtomicUsize>) -> CacheConfig<u32, String> {
        CacheConfig::lru(16).loader(move |key: u32| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Loaded::new(format!("value_{}", key)))
            }
        })
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = Cache::default();

        cache.set("key", "value").unwrap();
        assert_eq!(cache.get(&"key").unwrap(), "value");
        assert!(cache.has(&"key"));

        cache.remove(&"key");
        assert!(!cache.has(&"key"));
        assert!(matches!(cache.get(&"key"), Err(CacheError::KeyNotFound)));
    }

    #[test]
    fn test_cache_is_clone() {
        let cache1 = Cache::default();
        cache1.set("key", "value").unwrap();

        let cache2 = cache1.clone();

        // Both point to the same underlying data
        assert_eq!(cache2.get(&"key").unwrap(), "value");

        cache2.set("key2", "value2").unwrap();
        assert_eq!(cache1.get(&"key2").unwrap(), "value2");
    }

    #[test]
    fn test_cache_stats() {
        let cache = Cache::default();

        cache.set("key", "value").unwrap();
        let _ = cache.get(&"key");
        let _ = cache.get(&"missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(cache.stats_ref().hits(), 1);
    }

    #[test]
    fn test_cache_thread_safety() {
        use std::thread;

        let cache = Cache::new(CacheConfig::arc(64)).unwrap();
        let mut handles = vec![];

        // Spawn multiple threads that read/write concurrently
        for i in 0..10 {
            let cache = cache.clone();
            let handle = thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key_{}", j);
                    cache.set(key.clone(), format!("value_{}_{}", i, j)).unwrap();
                    let _ = cache.get(&key);
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!cache.is_empty());
        assert!(cache.len(false) <= 64);
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let result = Cache::<u32, u32>::new(CacheConfig::lfu(0));
        assert!(matches!(result, Err(CacheError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_debug_output() {
        let cache = Cache::<u32, u32>::new(CacheConfig::lru(3)).unwrap();
        cache.set(1, 1).unwrap();
        let rendered = format!("{:?}", cache);
        assert!(rendered.contains("Lru"));
        assert!(rendered.contains("len: 1"));
    }

    #[tokio::test]
    async fn test_get_or_load_without_loader() {
        let cache = Cache::<u32, u32>::new(CacheConfig::lru(2)).unwrap();
        assert!(matches!(
            cache.get_or_load(1, None).await,
            Err(CacheError::KeyNotFound)
        ));
    }

    #[tokio::test]
    async fn test_get_or_load_fills_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(counting_loader(Arc::clone(&calls))).unwrap();

        assert_eq!(cache.get_or_load(7, None).await.unwrap(), "value_7");
        assert_eq!(cache.get(&7).unwrap(), "value_7");
        assert_eq!(cache.get_or_load(7, None).await.unwrap(), "value_7");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().loads, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_load_deduplicates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(counting_loader(Arc::clone(&calls))).unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get_or_load(3, None).await }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "value_3");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let cache = Cache::new(CacheConfig::lru(4).loader(move |key: u32| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err("backend unavailable".into())
                } else {
                    Ok(Loaded::new(key + 1))
                }
            }
        }))
        .unwrap();

        assert!(matches!(
            cache.get_or_load(1, None).await,
            Err(CacheError::Loader(_))
        ));
        assert!(!cache.has(&1));

        // No retry happened on its own; the next call loads again.
        assert_eq!(cache.get_or_load(1, None).await.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().load_failures, 1);
    }

    #[tokio::test]
    async fn test_loader_panic_becomes_fault() {
        let cache = Cache::new(CacheConfig::lru(4).loader(|key: u32| async move {
            if key == 13 {
                panic!("unlucky key");
            }
            Ok(Loaded::new(key))
        }))
        .unwrap();

        assert!(matches!(
            cache.get_or_load(13, None).await,
            Err(CacheError::LoaderFault(_))
        ));
        assert_eq!(cache.get_or_load(12, None).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_loader_ttl_override() {
        let clock = ManualClock::new();
        let cache = Cache::new(
            CacheConfig::lru(4)
                .clock(clock.clone())
                .default_ttl(Duration::from_secs(600))
                .loader(|key: u32| async move {
                    Ok(Loaded::new(key).with_ttl(Duration::from_secs(1)))
                }),
        )
        .unwrap();

        cache.get_or_load(1, None).await.unwrap();
        clock.advance(Duration::from_secs(2));
        assert!(!cache.has(&1));
    }

    #[tokio::test]
    async fn test_get_if_present_loads_in_background() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(counting_loader(Arc::clone(&calls))).unwrap();

        assert!(matches!(
            cache.get_if_present(&5),
            Err(CacheError::KeyNotFound)
        ));
        // A second miss joins nothing and starts nothing new.
        assert!(cache.get_if_present(&5).is_err());

        for _ in 0..100 {
            if cache.has(&5) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(cache.get_if_present(&5).unwrap(), "value_5");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_if_present_outside_runtime() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(counting_loader(Arc::clone(&calls))).unwrap();

        assert!(matches!(
            cache.get_if_present(&5),
            Err(CacheError::KeyNotFound)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_get_or_load_outside_tokio_runtime() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(counting_loader(Arc::clone(&calls))).unwrap();
        cache.set(1, "cached".to_string()).unwrap();

        // Hits need no runtime.
        let hit = futures::executor::block_on(cache.get_or_load(1, None));
        assert_eq!(hit.unwrap(), "cached");

        let miss = futures::executor::block_on(cache.get_or_load(2, None));
        assert!(matches!(miss, Err(CacheError::LoaderFault(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!cache.has(&2));
    }

    #[tokio::test]
    async fn test_load_returns_resident_value_without_loading() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(counting_loader(Arc::clone(&calls))).unwrap();
        cache.set(4, "value_4".to_string()).unwrap();

        // A load path that finds the value resident hands it back directly.
        match cache.load(4, false) {
            Flight::Ready(stored) => assert_eq!(stored, "value_4"),
            _ => panic!("expected a resident value"),
        }
        assert_eq!(cache.inner.group.in_flight(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_wait_still_fills_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(counting_loader(Arc::clone(&calls))).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            cache.get_or_load(9, Some(&token)).await,
            Err(CacheError::Cancelled)
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.get(&9).unwrap(), "value_9");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loaded_value_goes_through_transforms() {
        let cache = Cache::new(
            CacheConfig::lru(4)
                .serialize_with(|_, value: String| Ok(value.to_uppercase()))
                .deserialize_with(|_, value: String| Ok(value.to_lowercase()))
                .loader(|key: u32| async move { Ok(Loaded::new(format!("v{}", key))) }),
        )
        .unwrap();

        assert_eq!(cache.get_or_load(1, None).await.unwrap(), "v1");
        assert_eq!(cache.get(&1).unwrap(), "v1");
    }
}
