//! # Policy Cache
//!
//! A thread-safe, in-process cache for Rust with pluggable eviction
//! policies, TTL support and deduplicated loading.
//!
//! ## Features
//!
//! - **Thread-safe**: Share across threads with `Clone` (uses `Arc` internally)
//! - **Eviction policies**: Simple (unbounded), LRU, LFU and ARC
//! - **TTL support**: Entries can expire after a configurable duration
//! - **Single-flight loading**: Concurrent misses on a key share one loader call
//! - **Hooks**: Observe evictions, inserts and purges; transform stored values
//! - **Statistics**: Track cache hits, misses, evictions, and more
//! - **Zero unsafe code**: Built entirely with safe Rust
//!
//! ## Quick Start
//!
//! ```rust
//! use policy_cache::{Cache, CacheConfig, EvictionPolicy};
//! use std::time::Duration;
//!
//! // Create a cache with configuration
//! let config = CacheConfig::new()
//!     .policy(EvictionPolicy::Arc)
//!     .max_capacity(10_000)
//!     .default_ttl(Duration::from_secs(300));
//!
//! let cache = Cache::new(config).unwrap();
//!
//! // Store and retrieve values
//! cache.set("user:123", "Alice").unwrap();
//!
//! if let Ok(value) = cache.get(&"user:123") {
//!     println!("Found: {}", value);
//! }
//!
//! // Set with custom TTL
//! cache
//!     .set_with_expire("session:abc", "session_data", Duration::from_secs(60))
//!     .unwrap();
//!
//! // Check statistics
//! let stats = cache.stats();
//! println!("Hit rate: {:.1}%", stats.hit_rate);
//! ```
//!
//! ## Loading
//!
//! With a loader configured, [`Cache::get_or_load`] computes missing values.
//! Concurrent callers for the same key wait on a single load:
//!
//! ```rust
//! use policy_cache::{Cache, CacheConfig, Loaded};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = Cache::new(CacheConfig::lru(1_000).loader(|id: u64| async move {
//!     // Expensive lookup goes here
//!     Ok(Loaded::new(format!("user-{}", id)).with_ttl(Duration::from_secs(30)))
//! }))
//! .unwrap();
//!
//! let (a, b) = tokio::join!(cache.get_or_load(7, None), cache.get_or_load(7, None));
//! assert_eq!(a.unwrap(), b.unwrap());
//! assert_eq!(cache.stats().loads, 1);
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! The cache is safe to share across threads. Cloning a `Cache` creates a new
//! handle to the same underlying data:
//!
//! ```rust
//! use policy_cache::Cache;
//! use std::thread;
//!
//! let cache = Cache::default();
//!
//! let handles: Vec<_> = (0..4).map(|i| {
//!     let cache = cache.clone();
//!     thread::spawn(move || {
//!         cache.set(format!("key_{}", i), format!("value_{}", i)).unwrap();
//!     })
//! }).collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.len(false), 4);
//! ```

// Public API
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod stats;

pub use cache::Cache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, LoadFuture, Loaded, Loader, Observer, Transform};
pub use error::{BoxError, CacheError, CacheResult, SharedError};
pub use policy::EvictionPolicy;
pub use stats::{CacheStats, StatsSnapshot};
pub use tokio_util::sync::CancellationToken;

// Internal modules - not part of public API
pub(crate) mod entry;
pub(crate) mod load_group;
pub(crate) mod policy;
pub(crate) mod storage;
