//! Builder API for assembling a [`FetchCache`].
//!
//! Every part has a default: the store comes from the configuration, the clock
//! is the system clock and the tag registry is fresh. Supply your own parts to
//! share a registry between caches or to drive time by hand in tests.

use std::sync::Arc;

use crate::cache::FetchCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{FetchCacheConfig, StoreKind};
use crate::store::Store;
use crate::stores::memory::{EvictOnSetConfig, HashMapStore, HashMapStoreConfig};
use crate::stores::moka::{MokaStore, MokaStoreConfig};
use crate::tags::TagRegistry;

/// Builder for [`FetchCache`].
///
/// # Example
///
/// ```ignore
/// use fetch_cache::{FetchCacheBuilder, FetchCacheConfig, RevalidationMode};
///
/// let cache = FetchCacheBuilder::new()
///     .config(FetchCacheConfig {
///         revalidation: RevalidationMode::Background,
///         ..Default::default()
///     })
///     .build();
/// ```
#[derive(Default)]
pub struct FetchCacheBuilder {
    config: FetchCacheConfig,
    store: Option<Arc<dyn Store>>,
    clock: Option<Arc<dyn Clock>>,
    registry: Option<Arc<TagRegistry>>,
}

impl FetchCacheBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `FETCH_CACHE_*` environment variables.
    pub fn from_env() -> Self {
        Self::new().config(FetchCacheConfig::from_env())
    }

    pub fn config(mut self, config: FetchCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this store instead of the one named by the configuration.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn registry(mut self, registry: Arc<TagRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> FetchCache {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Self::default_store(&config));

        tracing::debug!(
            store = store.name(),
            revalidation = ?config.revalidation,
            coalesce_in_flight = config.coalesce_in_flight,
            "building fetch cache"
        );

        FetchCache::new(
            store,
            self.registry.unwrap_or_default(),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config.revalidation,
            config.coalesce_in_flight,
        )
    }

    fn default_store(config: &FetchCacheConfig) -> Arc<dyn Store> {
        match config.store {
            StoreKind::Moka => Arc::new(MokaStore::new(MokaStoreConfig {
                max_capacity: config.max_capacity,
                time_to_idle: None,
            })),
            StoreKind::HashMap => Arc::new(HashMapStore::new(HashMapStoreConfig {
                evict_on_set: Some(EvictOnSetConfig {
                    frequency: 0.1,
                    max_items: usize::try_from(config.max_capacity).unwrap_or(usize::MAX),
                }),
            })),
        }
    }
}
