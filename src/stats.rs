//! Statistics for the cache.
//!
//! This module provides atomic counters for tracking cache operations,
//! enabling observability without taking the structural lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache operations.
///
/// All counters are atomic and only ever increase.
/// Use `Cache::stats()` to get a snapshot of the current values.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups that found a live entry.
    hits: AtomicU64,

    /// Lookups that found nothing, or only an expired entry.
    misses: AtomicU64,

    /// Entries evicted to respect capacity.
    evictions: AtomicU64,

    /// Entries removed lazily because their TTL had passed.
    expirations: AtomicU64,

    /// Entries removed through `remove`.
    removals: AtomicU64,

    /// Loader calls that produced a value.
    loads: AtomicU64,

    /// Loader calls that returned an error.
    load_failures: AtomicU64,
}

impl CacheStats {
    /// Create a new stats instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load_failure(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of cache hits.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get the number of cache misses.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get the number of capacity evictions.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get the number of lazy expirations.
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Get the number of explicit removals.
    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    /// Get the number of successful loads.
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Get the number of failed loads.
    pub fn load_failures(&self) -> u64 {
        self.load_failures.load(Ordering::Relaxed)
    }

    /// Total number of lookups (hits plus misses).
    pub fn lookups(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Calculate the hit rate as a percentage (0.0 to 100.0).
    /// Returns 0.0 if no lookups have been performed.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Create a snapshot of the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            lookups: self.lookups(),
            evictions: self.evictions(),
            expirations: self.expirations(),
            removals: self.removals(),
            loads: self.loads(),
            load_failures: self.load_failures(),
            hit_rate: self.hit_rate(),
        }
    }
}

/// A point-in-time snapshot of cache statistics.
///
/// Unlike `CacheStats`, this struct contains plain values (not atomics)
/// and can be easily logged or compared.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub lookups: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub removals: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub hit_rate: f64,
}
