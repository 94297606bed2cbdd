use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::entry::CacheEntry;
use crate::error::FetchError;
use crate::strategy::CacheKey;
use crate::utils::lock_or_recover;

/// Called with every entry a store drops on its own (capacity or idle expiry).
pub type EvictionListener = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

/// A store is a common interface for storing, reading and deleting cache entries.
///
/// Stores never expire entries by time on their own: a stale entry is still
/// needed as a fallback when a refresh fails. They may evict for capacity.
#[async_trait]
pub trait Store: Send + Sync {
    /// A name for metrics/tracing.
    ///
    /// # Example
    /// - "hashmap"
    /// - "moka"
    fn name(&self) -> &'static str;

    /// Return the stored entry.
    ///
    /// The response must be `None` for cache misses.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, FetchError>;

    /// Insert or replace the entry under `entry.key`.
    async fn set(&self, entry: CacheEntry) -> Result<(), FetchError>;

    /// Removes the key(s) from the store.
    async fn remove(&self, keys: &[CacheKey]) -> Result<(), FetchError>;

    /// Subscribe to evictions. Explicit `remove` calls and replacements are not reported.
    ///
    /// Stores that never evict can keep the default, which ignores the listener.
    fn on_evict(&self, _listener: EvictionListener) {}
}

/// Listener list for stores that evict.
#[derive(Default)]
pub struct EvictionListeners(Mutex<Vec<EvictionListener>>);

impl EvictionListeners {
    pub fn add(&self, listener: EvictionListener) {
        lock_or_recover(&self.0, "store.on_evict").push(listener);
    }

    pub fn notify(&self, entry: &CacheEntry) {
        for listener in lock_or_recover(&self.0, "store.notify_evicted").iter() {
            listener(entry);
        }
    }
}
