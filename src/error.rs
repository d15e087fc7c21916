//! Error types for the cache library.
//!
//! Every failure mode of a cache operation is surfaced as a [`CacheError`].
//! Loader and transform errors are kept behind an `Arc` so that one load
//! result can be handed to every caller waiting on it.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by user-supplied loaders and transform hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared form of a [`BoxError`], cheap to clone across waiters.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// The main error type for cache operations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The key is not resident (or has expired) and nothing loaded it.
    #[error("key not found")]
    KeyNotFound,

    /// The configured loader returned an error.
    #[error("loader failed: {0}")]
    Loader(#[source] SharedError),

    /// The loader panicked, or its task ended before producing a result.
    #[error("loader fault: {0}")]
    LoaderFault(String),

    /// A serialize or deserialize hook returned an error.
    #[error("serialization failed: {0}")]
    Serialization(#[source] SharedError),

    /// The cache configuration (or a resize request) is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The caller stopped waiting for an in-flight load.
    #[error("wait for in-flight load was cancelled")]
    Cancelled,
}

impl CacheError {
    pub(crate) fn loader(err: BoxError) -> Self {
        CacheError::Loader(Arc::from(err))
    }

    pub(crate) fn serialization(err: BoxError) -> Self {
        CacheError::Serialization(Arc::from(err))
    }

    /// Returns `true` for a plain miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::KeyNotFound)
    }
}

/// A specialized Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
