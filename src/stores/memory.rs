use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::entry::CacheEntry;
use crate::error::FetchError;
use crate::store::{EvictionListener, EvictionListeners, Store};
use crate::strategy::CacheKey;

/// Configuration for eviction on set operations.
#[derive(Debug, Clone)]
pub struct EvictOnSetConfig {
    /// Provide a number between 0 and 1 to calculate whether eviction should run on each set.
    ///
    /// - `1.0` -> run eviction on every `set`
    /// - `0.5` -> run eviction on every 2nd `set` (on average)
    /// - `0.0` -> disable eviction
    pub frequency: f64,

    /// Remove the oldest entries until the number of items is at most `max_items`.
    pub max_items: usize,
}

/// Configuration for HashMapStore.
#[derive(Debug, Clone, Default)]
pub struct HashMapStoreConfig {
    pub evict_on_set: Option<EvictOnSetConfig>,
}

/// Thread-safe in-memory store using HashMap with RwLock.
///
/// Suited to small caches and low concurrency. For high-concurrency
/// scenarios, use `MokaStore` instead.
pub struct HashMapStore {
    state: RwLock<HashMap<CacheKey, CacheEntry>>,
    evict_on_set: Option<EvictOnSetConfig>,
    listeners: EvictionListeners,
}

impl HashMapStore {
    pub fn new(config: HashMapStoreConfig) -> Self {
        HashMapStore {
            state: RwLock::new(HashMap::new()),
            evict_on_set: config.evict_on_set,
            listeners: EvictionListeners::default(),
        }
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.is_empty()
    }

    /// Run eviction if configured and random check passes.
    async fn maybe_evict(&self) {
        let Some(ref config) = self.evict_on_set else {
            return;
        };

        if config.frequency <= 0.0 {
            return;
        }

        let should_evict = config.frequency >= 1.0 || rand::random::<f64>() < config.frequency;
        if !should_evict {
            return;
        }

        let evicted: Vec<CacheEntry> = {
            let mut state = self.state.write().await;
            if state.len() <= config.max_items {
                return;
            }

            // Oldest fetches go first
            let mut entries: Vec<_> = state
                .iter()
                .map(|(k, v)| (k.clone(), v.stored_at))
                .collect();
            entries.sort_by_key(|(_, stored_at)| *stored_at);

            let to_remove = state.len() - config.max_items;
            entries
                .into_iter()
                .take(to_remove)
                .filter_map(|(key, _)| {
                    tracing::debug!(key = %key, "evicting entry from hashmap store");
                    state.remove(&key)
                })
                .collect()
        };

        for entry in &evicted {
            self.listeners.notify(entry);
        }
    }
}

#[async_trait]
impl Store for HashMapStore {
    fn name(&self) -> &'static str {
        "hashmap"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, FetchError> {
        let state = self.state.read().await;
        Ok(state.get(key).cloned())
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), FetchError> {
        {
            let mut state = self.state.write().await;
            state.insert(entry.key.clone(), entry);
        }

        self.maybe_evict().await;
        Ok(())
    }

    async fn remove(&self, keys: &[CacheKey]) -> Result<(), FetchError> {
        let mut state = self.state.write().await;

        for key in keys {
            state.remove(key);
        }

        Ok(())
    }

    fn on_evict(&self, listener: EvictionListener) {
        self.listeners.add(listener);
    }
}
