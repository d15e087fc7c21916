//! Cache entry with its expiration deadline.

use std::time::Instant;

/// A stored value plus the instant after which it is considered expired.
///
/// The key is kept by the policy structure that owns the entry.
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    /// The stored (possibly serialized) value.
    pub(crate) value: V,

    /// When this entry expires. `None` means no expiration.
    pub(crate) expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    pub(crate) fn new(value: V, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    /// An entry is expired once its deadline lies strictly before `now`.
    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => deadline < now,
            None => false,
        }
    }
}
