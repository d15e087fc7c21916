//! Single-flight loading.
//!
//! At most one load per key is in flight at a time. The first caller for a
//! key starts the load on a tokio task; later callers park a notifier next
//! to the record and receive a clone of the same result. The task keeps
//! running even if every waiter goes away, so the value still lands in the
//! cache.

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::hash_map::{Entry, HashMap};
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::{CacheError, CacheResult};

type Notifier<V> = oneshot::Sender<CacheResult<V>>;
type Waiter<V> = oneshot::Receiver<CacheResult<V>>;
type Calls<K, V> = Arc<Mutex<HashMap<K, Vec<Notifier<V>>>>>;

/// Outcome of joining a load.
pub(crate) enum Flight<V> {
    /// The value was already resident once the registry lock was held.
    Ready(V),
    /// This caller started the load.
    Leader(Waiter<V>),
    /// A load was already running; this caller shares its result.
    Follower(Waiter<V>),
    /// A load was already running and the caller did not want to wait.
    Busy,
}

impl<V> Flight<V> {
    /// Wait for the shared result.
    ///
    /// Cancelling `cancel` only abandons this wait; the load itself runs to
    /// completion.
    pub(crate) async fn wait(self, cancel: Option<&CancellationToken>) -> CacheResult<V> {
        let waiter = match self {
            Flight::Ready(value) => return Ok(value),
            Flight::Leader(waiter) | Flight::Follower(waiter) => waiter,
            Flight::Busy => return Err(CacheError::KeyNotFound),
        };

        let received = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(CacheError::Cancelled),
                received = waiter => received,
            },
            None => waiter.await,
        };

        received.unwrap_or_else(|_| {
            Err(CacheError::LoaderFault(
                "load task ended without a result".to_string(),
            ))
        })
    }
}

pub(crate) struct LoadGroup<K, V> {
    calls: Calls<K, V>,
}

impl<K, V> LoadGroup<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the load for `key`, starting it with `make` if none is running.
    ///
    /// Before a new load is registered, `cached` is asked for a resident
    /// value under the registry lock; a load that finished after the
    /// caller's miss yields [`Flight::Ready`] instead of a second load.
    /// With `wait == false` an already running load yields [`Flight::Busy`]
    /// instead of a waiter. Must be called from within a tokio runtime.
    pub(crate) fn call<C, F, Fut>(&self, key: K, wait: bool, cached: C, make: F) -> Flight<V>
    where
        C: FnOnce() -> Option<V>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<V>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        match self.calls.lock().entry(key.clone()) {
            Entry::Occupied(mut record) => {
                if !wait {
                    return Flight::Busy;
                }
                record.get_mut().push(tx);
                return Flight::Follower(rx);
            }
            Entry::Vacant(record) => {
                if let Some(value) = cached() {
                    return Flight::Ready(value);
                }
                record.insert(vec![tx]);
            }
        }

        let guard = CallGuard {
            calls: Arc::clone(&self.calls),
            key: Some(key),
        };
        let load = make();
        trace!("starting load");
        tokio::spawn(async move {
            let result = match AssertUnwindSafe(load).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(&*payload);
                    warn!(%message, "loader panicked");
                    Err(CacheError::LoaderFault(message))
                }
            };
            guard.complete(result);
        });

        Flight::Leader(rx)
    }

    /// Number of keys with a load in flight.
    pub(crate) fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Owns a key's record until the load completes. Dropping it early (the
/// task was torn down) clears the record so the key can be loaded again.
struct CallGuard<K: Hash + Eq, V> {
    calls: Calls<K, V>,
    key: Option<K>,
}

impl<K: Hash + Eq, V: Clone> CallGuard<K, V> {
    fn complete(mut self, result: CacheResult<V>) {
        let Some(key) = self.key.take() else {
            return;
        };
        let notifiers = self.calls.lock().remove(&key).unwrap_or_default();
        for notifier in notifiers {
            // The waiter may have been cancelled.
            let _ = notifier.send(result.clone());
        }
    }
}

impl<K: Hash + Eq, V> Drop for CallGuard<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.calls.lock().remove(&key);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "loader panicked".to_string()
    }
}
