use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::config::RevalidationMode;
use crate::entry::{CacheEntry, Payload};
use crate::error::FetchError;
use crate::pass::RenderPass;
use crate::store::Store;
use crate::strategy::{CacheKey, FetchRequest};
use crate::tags::TagRegistry;
use crate::utils::lock_or_recover;

/// A fetch that may be awaited by several callers at once.
pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<Payload, FetchError>>>;

/// Outcome of looking a key up in the store.
enum Lookup {
    Miss,
    Fresh(CacheEntry),
    /// Past its window or invalidated, still usable as a fallback.
    Stale(CacheEntry),
}

/// Strategy-driven fetch cache.
///
/// Decides per request whether to reuse a stored response, fetch and store a
/// new one, or fetch without storing. Cheap to clone; clones share the store,
/// the tag registry and the in-flight map.
#[derive(Clone)]
pub struct FetchCache {
    store: Arc<dyn Store>,
    registry: Arc<TagRegistry>,
    clock: Arc<dyn Clock>,
    revalidation: RevalidationMode,
    coalesce_in_flight: bool,
    /// At most one refresh per key across passes when coalescing is enabled.
    in_flight: Arc<Mutex<HashMap<CacheKey, SharedFetch>>>,
    next_pass_id: Arc<AtomicU64>,
}

impl FetchCache {
    /// Create a new fetch cache.
    ///
    /// Prefer [`FetchCacheBuilder`](crate::FetchCacheBuilder) unless every part is at hand.
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<TagRegistry>,
        clock: Arc<dyn Clock>,
        revalidation: RevalidationMode,
        coalesce_in_flight: bool,
    ) -> Self {
        // Evicted entries take their tag mappings with them
        let evicted_from = Arc::downgrade(&registry);
        store.on_evict(Arc::new(move |entry: &CacheEntry| {
            if let Some(registry) = evicted_from.upgrade() {
                registry.release(&entry.key, entry.generation);
            }
        }));

        FetchCache {
            store,
            registry,
            clock,
            revalidation,
            coalesce_in_flight,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_pass_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn revalidation(&self) -> RevalidationMode {
        self.revalidation
    }

    /// Start a rendering pass. Deduplication slots live as long as the pass.
    pub fn begin_pass(&self) -> RenderPass {
        RenderPass::new(self.next_pass_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Resolve a request according to its strategy.
    ///
    /// - `NoStore`: always fetch, never touch the store; errors pass through unchanged
    /// - `Forever`: serve the stored entry unless invalidated, otherwise fetch and store
    /// - `RevalidateAfter` / `TaggedRevalidate`: serve while inside the window and not
    ///   invalidated, otherwise refresh
    ///
    /// A failed refresh falls back to the previous entry when there is one, leaving
    /// it untouched. Without one the failure surfaces as `NoFallbackAvailable`.
    pub async fn resolve<F, Fut>(
        &self,
        request: &FetchRequest,
        fetcher: F,
    ) -> Result<Payload, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        if !request.strategy.is_stored() {
            tracing::debug!(target_url = %request.target, "no-store fetch");
            return fetcher().await;
        }

        let key = request.key();

        match self.lookup(&key).await {
            Lookup::Fresh(entry) => {
                let age_ms = entry.age_ms(self.clock.now_ms());
                tracing::debug!(key = %key, age_ms, "cache hit");
                Ok(entry.payload)
            }
            Lookup::Stale(entry) => match self.revalidation {
                RevalidationMode::Background => {
                    tracing::debug!(key = %key, "serving stale entry, revalidating in background");
                    self.spawn_revalidation(request, key, fetcher);
                    Ok(entry.payload)
                }
                RevalidationMode::Blocking => {
                    tracing::debug!(key = %key, "stale entry, revalidating");
                    match self.refresh(request, key.clone(), fetcher).await {
                        Ok(payload) => Ok(payload),
                        Err(err) => {
                            tracing::warn!(
                                key = %key,
                                error = %err,
                                stored_at = entry.stored_at,
                                "revalidation failed, serving stale entry"
                            );
                            Ok(entry.payload)
                        }
                    }
                }
            },
            Lookup::Miss => {
                tracing::debug!(key = %key, "cache miss");
                self.refresh(request, key.clone(), fetcher)
                    .await
                    .map_err(|err| FetchError::no_fallback(key.to_string(), err))
            }
        }
    }

    /// Invalidate every entry tagged with `tag`. Returns the number of keys affected.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.registry.invalidate_tag(tag)
    }

    /// Invalidate every stored entry regardless of tags.
    pub fn invalidate_all(&self) -> usize {
        self.registry.invalidate_all()
    }

    /// Return the stored entry for `key` without fetching or checking freshness.
    pub async fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "store read failed");
                None
            }
        }
    }

    /// Drop the entry for `key` and its tag mappings.
    pub async fn remove(&self, key: &CacheKey) -> Result<(), FetchError> {
        self.registry.unregister(key);
        self.store.remove(std::slice::from_ref(key)).await
    }

    async fn lookup(&self, key: &CacheKey) -> Lookup {
        // A failing store read is treated as a miss
        let Some(entry) = self.peek(key).await else {
            return Lookup::Miss;
        };

        if self.registry.is_invalidated(key, entry.generation) {
            tracing::debug!(key = %key, "entry invalidated");
            return Lookup::Stale(entry);
        }

        if entry.is_within_window(self.clock.now_ms()) {
            Lookup::Fresh(entry)
        } else {
            Lookup::Stale(entry)
        }
    }

    /// Fetch and store, joining an in-flight refresh of the same key if there is one.
    async fn refresh<F, Fut>(
        &self,
        request: &FetchRequest,
        key: CacheKey,
        fetcher: F,
    ) -> Result<Payload, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        if !self.coalesce_in_flight {
            return self.fetch_and_store(request, key, fetcher).await;
        }

        let shared = {
            let mut in_flight = lock_or_recover(&self.in_flight, "cache.in_flight");
            if let Some(existing) = in_flight.get(&key) {
                tracing::debug!(key = %key, "joining in-flight fetch");
                existing.clone()
            } else {
                let shared = self.fetch_and_store(request, key.clone(), fetcher);
                in_flight.insert(key.clone(), shared.clone());
                shared
            }
        };

        let result = shared.clone().await;

        let mut in_flight = lock_or_recover(&self.in_flight, "cache.in_flight");
        if in_flight.get(&key).is_some_and(|current| current.ptr_eq(&shared)) {
            in_flight.remove(&key);
        }

        result
    }

    /// Build the shared fetch-then-store future for `key`.
    ///
    /// The registry generation is taken before the fetch starts, so an
    /// invalidation issued while the fetch is running expires its result.
    /// When nothing ends up stored the registration is released again.
    fn fetch_and_store<F, Fut>(
        &self,
        request: &FetchRequest,
        key: CacheKey,
        fetcher: F,
    ) -> SharedFetch
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        let store = self.store.clone();
        let registry = self.registry.clone();
        let clock = self.clock.clone();
        let strategy = request.strategy.clone();

        async move {
            let generation = registry.register_entry(&key, strategy.tags());
            let payload = match fetcher().await {
                Ok(payload) => payload,
                Err(err) => {
                    match store.get(&key).await {
                        Ok(Some(previous)) => {
                            registry.rollback(&key, generation, previous.generation)
                        }
                        _ => {
                            registry.release(&key, generation);
                        }
                    }
                    return Err(err);
                }
            };

            let entry = CacheEntry::new(
                key.clone(),
                payload.clone(),
                clock.now_ms(),
                strategy,
                generation,
            );
            if let Err(err) = store.set(entry).await {
                tracing::warn!(key = %key, error = %err, "failed to store fetched entry");
                registry.release(&key, generation);
            } else {
                tracing::debug!(key = %key, generation, "stored entry");
            }

            Ok(payload)
        }
        .boxed()
        .shared()
    }

    /// Spawn a background revalidation task.
    fn spawn_revalidation<F, Fut>(&self, request: &FetchRequest, key: CacheKey, fetcher: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Payload, FetchError>> + Send + 'static,
    {
        let cache = self.clone();
        let request = request.clone();

        tokio::spawn(async move {
            if let Err(err) = cache.refresh(&request, key.clone(), fetcher).await {
                tracing::warn!(key = %key, error = %err, "background revalidation failed");
            }
        });
    }
}
