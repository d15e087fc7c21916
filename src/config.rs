//! Configuration for the cache.
//!
//! A [`CacheConfig`] names the eviction policy, its capacity, the default
//! TTL and the optional hooks (loader, observers, transforms). It is
//! validated once, when the cache is built.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::{BoxError, CacheError, CacheResult};
use crate::policy::EvictionPolicy;

/// A value produced by the loader, with an optional TTL override.
///
/// Without an override the cache's default TTL applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<V> {
    pub value: V,
    pub ttl: Option<Duration>,
}

impl<V> Loaded<V> {
    pub fn new(value: V) -> Self {
        Self { value, ttl: None }
    }

    /// Expire the loaded value after `ttl` instead of the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Future returned by a loader.
pub type LoadFuture<V> = BoxFuture<'static, Result<Loaded<V>, BoxError>>;

/// Computes the value for a missing key.
pub type Loader<K, V> = Arc<dyn Fn(K) -> LoadFuture<V> + Send + Sync>;

/// Called with a key and its stored value.
pub type Observer<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Maps a value on its way into or out of the cache.
pub type Transform<K, V> = Arc<dyn Fn(&K, V) -> Result<V, BoxError> + Send + Sync>;

/// Optional callbacks the cache invokes around its entries.
pub(crate) struct Hooks<K, V> {
    pub(crate) on_evicted: Option<Observer<K, V>>,
    pub(crate) on_added: Option<Observer<K, V>>,
    pub(crate) on_purge: Option<Observer<K, V>>,
    pub(crate) serialize: Option<Transform<K, V>>,
    pub(crate) deserialize: Option<Transform<K, V>>,
}

impl<K, V> Default for Hooks<K, V> {
    fn default() -> Self {
        Self {
            on_evicted: None,
            on_added: None,
            on_purge: None,
            serialize: None,
            deserialize: None,
        }
    }
}

/// Configuration for creating a new cache instance.
///
/// Use the builder pattern to construct configuration:
///
/// ```
/// use policy_cache::{CacheConfig, EvictionPolicy};
/// use std::time::Duration;
///
/// let config = CacheConfig::<String, String>::new()
///     .policy(EvictionPolicy::Lru)
///     .max_capacity(10_000)
///     .default_ttl(Duration::from_secs(300))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.get_max_capacity(), 10_000);
/// ```
pub struct CacheConfig<K, V> {
    /// Which eviction algorithm to use.
    pub(crate) policy: EvictionPolicy,

    /// Maximum number of resident entries. Ignored by `Simple`.
    pub(crate) max_capacity: usize,

    /// Default TTL for entries set without one.
    /// `None` means entries don't expire by default.
    pub(crate) default_ttl: Option<Duration>,

    pub(crate) clock: Arc<dyn Clock>,

    pub(crate) loader: Option<Loader<K, V>>,

    pub(crate) hooks: Hooks<K, V>,
}

impl<K, V> Default for CacheConfig<K, V> {
    fn default() -> Self {
        Self {
            policy: EvictionPolicy::Simple,
            max_capacity: 0,
            default_ttl: None,
            clock: Arc::new(SystemClock),
            loader: None,
            hooks: Hooks::default(),
        }
    }
}

impl<K, V> CacheConfig<K, V> {
    /// Create a new configuration builder with default values
    /// (unbounded `Simple` policy, no TTL, no hooks).
    pub fn new() -> Self {
        Self::default()
    }

    /// An LRU configuration holding at most `capacity` entries.
    pub fn lru(capacity: usize) -> Self {
        Self::new().policy(EvictionPolicy::Lru).max_capacity(capacity)
    }

    /// An LFU configuration holding at most `capacity` entries.
    pub fn lfu(capacity: usize) -> Self {
        Self::new().policy(EvictionPolicy::Lfu).max_capacity(capacity)
    }

    /// An ARC configuration holding at most `capacity` entries.
    pub fn arc(capacity: usize) -> Self {
        Self::new().policy(EvictionPolicy::Arc).max_capacity(capacity)
    }

    /// Select the eviction policy.
    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the maximum capacity of the cache.
    ///
    /// Required (and must be positive) for every policy except `Simple`.
    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Set the default TTL for entries.
    ///
    /// Set to `Duration::ZERO` to disable the default TTL.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self
    }

    /// Replace the time source used for expiration.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Compute values for missing keys.
    ///
    /// Concurrent misses on the same key share a single loader call.
    pub fn loader<F, Fut>(mut self, loader: F) -> Self
    where
        K: 'static,
        V: 'static,
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Loaded<V>, BoxError>> + Send + 'static,
    {
        let loader: Loader<K, V> =
            Arc::new(move |key: K| -> LoadFuture<V> { Box::pin(loader(key)) });
        self.loader = Some(loader);
        self
    }

    /// Called when an entry leaves through eviction, removal or expiration.
    pub fn on_evicted(mut self, f: impl Fn(&K, &V) + Send + Sync + 'static) -> Self {
        self.hooks.on_evicted = Some(Arc::new(f));
        self
    }

    /// Called after an entry has been inserted.
    pub fn on_added(mut self, f: impl Fn(&K, &V) + Send + Sync + 'static) -> Self {
        self.hooks.on_added = Some(Arc::new(f));
        self
    }

    /// Called once per entry dropped by `purge`.
    pub fn on_purge(mut self, f: impl Fn(&K, &V) + Send + Sync + 'static) -> Self {
        self.hooks.on_purge = Some(Arc::new(f));
        self
    }

    /// Transform values before they are stored.
    pub fn serialize_with(
        mut self,
        f: impl Fn(&K, V) -> Result<V, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.serialize = Some(Arc::new(f));
        self
    }

    /// Transform stored values before they are returned.
    pub fn deserialize_with(
        mut self,
        f: impl Fn(&K, V) -> Result<V, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.deserialize = Some(Arc::new(f));
        self
    }

    /// Validate and return the final configuration.
    pub fn build(self) -> CacheResult<Self> {
        self.validate()?;
        Ok(self)
    }

    pub(crate) fn validate(&self) -> CacheResult<()> {
        if self.policy.is_bounded() && self.max_capacity == 0 {
            return Err(CacheError::InvalidConfiguration(format!(
                "{} cache requires a positive capacity",
                self.policy
            )));
        }
        Ok(())
    }

    /// Get the eviction policy.
    pub fn get_policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Get the maximum capacity.
    pub fn get_max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Get the default TTL, if set.
    pub fn get_default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }
}

impl<K, V> fmt::Debug for CacheConfig<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("policy", &self.policy)
            .field("max_capacity", &self.max_capacity)
            .field("default_ttl", &self.default_ttl)
            .field("loader", &self.loader.is_some())
            .field("on_evicted", &self.hooks.on_evicted.is_some())
            .field("on_added", &self.hooks.on_added.is_some())
            .field("on_purge", &self.hooks.on_purge.is_some())
            .field("serialize", &self.hooks.serialize.is_some())
            .field("deserialize", &self.hooks.deserialize.is_some())
            .finish()
    }
}
