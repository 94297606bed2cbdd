use async_trait::async_trait;
use moka::future::Cache;
use moka::notification::RemovalCause;
use std::sync::Arc;
use std::time::Duration;

use crate::entry::CacheEntry;
use crate::error::FetchError;
use crate::store::{EvictionListener, EvictionListeners, Store};
use crate::strategy::CacheKey;

/// Configuration for MokaStore.
#[derive(Debug, Clone)]
pub struct MokaStoreConfig {
    /// Maximum number of entries the cache can hold.
    pub max_capacity: u64,

    /// Time to idle: entries are evicted if not accessed within this duration.
    /// `None` keeps entries until capacity pressure or explicit removal.
    pub time_to_idle: Option<Duration>,
}

impl Default for MokaStoreConfig {
    fn default() -> Self {
        MokaStoreConfig {
            max_capacity: 10_000,
            time_to_idle: None,
        }
    }
}

/// Concurrent store backed by Moka.
///
/// No time-to-live is applied. Revalidation windows belong to the fetch
/// cache, and stale entries must survive to serve as fallbacks.
pub struct MokaStore {
    cache: Cache<CacheKey, CacheEntry>,
    listeners: Arc<EvictionListeners>,
}

impl MokaStore {
    /// Create a new MokaStore with the given configuration.
    ///
    /// # Example
    /// ```ignore
    /// let store = MokaStore::new(MokaStoreConfig {
    ///     max_capacity: 10_000,
    ///     time_to_idle: Some(Duration::from_secs(600)),
    /// });
    /// ```
    pub fn new(config: MokaStoreConfig) -> Self {
        let listeners = Arc::new(EvictionListeners::default());
        let notify = listeners.clone();
        let mut builder = Cache::builder()
            .max_capacity(config.max_capacity)
            .eviction_listener(
                move |key: Arc<CacheKey>, entry: CacheEntry, cause: RemovalCause| {
                    // Capacity and idle expiry only
                    if cause.was_evicted() {
                        tracing::debug!(key = %key, ?cause, "evicting entry from moka store");
                        notify.notify(&entry);
                    }
                },
            );

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        MokaStore {
            cache: builder.build(),
            listeners,
        }
    }

    /// Get cache statistics (for monitoring/debugging).
    pub fn stats(&self) -> (u64, u64) {
        (self.cache.entry_count(), self.cache.weighted_size())
    }

    /// Run moka's deferred maintenance now, delivering pending evictions.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl Store for MokaStore {
    fn name(&self) -> &'static str {
        "moka"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, FetchError> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), FetchError> {
        self.cache.insert(entry.key.clone(), entry).await;
        Ok(())
    }

    async fn remove(&self, keys: &[CacheKey]) -> Result<(), FetchError> {
        for key in keys {
            self.cache.invalidate(key).await;
        }

        Ok(())
    }

    fn on_evict(&self, listener: EvictionListener) {
        self.listeners.add(listener);
    }
}
